use crate::load_repo;
use crate::prelude::*;
use clap::ArgMatches;
use ew_analysis::enums::Origin;
use nu_ansi_term::Color;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;

#[derive(Debug, Serialize)]
struct JsonRejection {
    reason: Reason,
    origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    addr: Option<Addr>,
    /// The origin matches keep rules.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    kept: bool,
}

#[derive(Debug, Serialize)]
struct JsonReport {
    rounds: usize,
    stable: bool,
    accepted: Vec<String>,
    rejected: BTreeMap<String, Vec<JsonRejection>>,
}

pub fn run(args: &ArgMatches) -> EwResult<()> {
    init_logger(args);

    let inputs: Vec<&String> = args
        .get_many::<String>("input")
        .ok_or_else(|| EwError::BadArguments("--input needed".to_string()))?
        .collect();
    let repo = load_repo(&inputs)?;

    let candidates = if let Some(fname) = args.get_one::<String>("candidates") {
        let text = fs::read_to_string(fname)?;
        enums::load_candidates(&repo, &text)
    } else {
        enums::collect_candidate_enums(&repo)
    };
    log::info!("{} candidate enums", candidates.len());

    let options = AnalysisOptions {
        max_rounds: args.get_one::<usize>("rounds").copied(),
        threads: args.get_one::<usize>("threads").copied(),
    };
    if options.threads == Some(0) {
        return Err(EwError::BadArguments(
            "--threads must be positive".to_string(),
        ));
    }
    let report = enums::optimize(&repo, &candidates, &options)?;
    if !report.stable {
        log::warn!(
            "rounds limit reached after {} rounds, remaining candidates may be unsafe",
            report.rounds
        );
    }

    let class_pattern = args
        .get_one::<String>("filter-class")
        .map(|r| Regex::new(r))
        .transpose()?;
    let json = to_json_report(&repo, &report, class_pattern.as_ref());

    if let Some(fname) = args.get_one::<String>("output") {
        let mut file = File::create(fname)?;
        serde_json::to_writer_pretty(&mut file, &json)?;
        file.write_all(b"\n")?;
        log::info!("report written in {:?}", fname);
    }
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        print_report(&json, args.get_flag("reasons"));
    }

    log::info!(
        "{} enums can be unboxed, {} rejected",
        report.accepted.len(),
        report.rejected.len()
    );
    Ok(())
}

fn to_json_report(repo: &Repo, report: &Report, filter: Option<&Regex>) -> JsonReport {
    let types = repo.types();
    let name = |type_: TypeId| types.descriptor(type_).to_string();
    let selected = |descriptor: &String| filter.map_or(true, |r| r.is_match(descriptor));

    let mut rejected: BTreeMap<String, Vec<JsonRejection>> = report
        .rejected
        .iter()
        .map(|type_| (name(*type_), Vec::new()))
        .filter(|(descriptor, _)| selected(descriptor))
        .collect();
    for rejection in &report.diagnostics {
        if let Some(reasons) = rejected.get_mut(&name(rejection.type_)) {
            let (origin, kept) = match rejection.origin {
                Origin::Method(uid) => {
                    let method = &repo[uid];
                    (PrettyPrinter(method, types).to_string(), method.keep().has_keep())
                }
                Origin::Field(uid) => {
                    let field = &repo[uid];
                    (PrettyPrinter(field, types).to_string(), field.keep().has_keep())
                }
            };
            reasons.push(JsonRejection {
                reason: rejection.reason,
                origin,
                addr: rejection.addr,
                kept,
            });
        }
    }

    JsonReport {
        rounds: report.rounds,
        stable: report.stable,
        accepted: report
            .accepted
            .iter()
            .map(|type_| name(*type_))
            .filter(|descriptor| selected(descriptor))
            .collect(),
        rejected,
    }
}

fn print_report(report: &JsonReport, with_reasons: bool) {
    for descriptor in &report.accepted {
        println!("{}", Color::Green.paint(format!("+ {descriptor}")));
    }
    for (descriptor, reasons) in &report.rejected {
        println!("{}", Color::Red.paint(format!("- {descriptor}")));
        if !with_reasons {
            continue;
        }
        for rejection in reasons {
            let kept = if rejection.kept { " [kept]" } else { "" };
            match rejection.addr {
                Some(addr) => println!(
                    "    {} in {} at {addr}{kept}",
                    rejection.reason, rejection.origin
                ),
                None => println!("    {} ({}){kept}", rejection.reason, rejection.origin),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
.class public final enum LSize;
.super Ljava/lang/Enum;

.class public final enum LMode;
.super Ljava/lang/Enum;

.class public LHolder;
.method public static pinned(LSize;)V
.registers 1
.keep root
    return-void
.end method
"#;

    #[test]
    fn kept_origins() {
        let repo = ir::parse(SRC).unwrap();
        let candidates = enums::collect_candidate_enums(&repo);
        let report = enums::optimize(&repo, &candidates, &AnalysisOptions::default()).unwrap();
        let json = to_json_report(&repo, &report, None);

        assert_eq!(json.accepted, vec!["LMode;".to_string()]);
        let size = &json.rejected["LSize;"];
        assert_eq!(size.len(), 1);
        assert_eq!(size[0].reason, Reason::Unknown);
        assert!(size[0].kept);
        assert!(size[0].addr.is_none());

        let text = serde_json::to_string(&json).unwrap();
        assert!(text.contains("\"kept\":true"));
    }

    #[test]
    fn filtered_output() {
        let repo = ir::parse(SRC).unwrap();
        let candidates = enums::collect_candidate_enums(&repo);
        let report = enums::optimize(&repo, &candidates, &AnalysisOptions::default()).unwrap();
        let filter = Regex::new("Mode").unwrap();
        let json = to_json_report(&repo, &report, Some(&filter));

        assert_eq!(json.accepted, vec!["LMode;".to_string()]);
        assert!(json.rejected.is_empty());
        assert_eq!(report.rejected.len(), 1);
    }
}
