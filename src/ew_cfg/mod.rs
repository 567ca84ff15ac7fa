use crate::load_repo;
use crate::prelude::*;
use clap::ArgMatches;
use regex::Regex;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

pub fn run(args: &ArgMatches) -> EwResult<()> {
    init_logger(args);

    let inputs: Vec<&String> = args
        .get_many::<String>("input")
        .ok_or_else(|| EwError::BadArguments("--input needed".to_string()))?
        .collect();
    let repo = load_repo(&inputs)?;
    let types = repo.types();

    let class_pattern = args
        .get_one::<String>("filter-class")
        .map(|r| Regex::new(r))
        .transpose()?;
    let method_pattern = args
        .get_one::<String>("filter-method")
        .map(|r| Regex::new(r))
        .transpose()?;
    let classes: Box<dyn Iterator<Item = &Class>> = if let Some(r) = &class_pattern {
        Box::new(repo.find_classes(r))
    } else {
        Box::new(repo.iter_classes())
    };

    for (class, method) in classes
        .flat_map(|class| class.iter_methods(&repo).map(move |method| (class, method)))
        .filter(|(_, method)| {
            method_pattern
                .as_ref()
                .map_or(true, |r| r.is_match(method.name()))
        })
    {
        let Some(code) = method.code() else {
            continue;
        };
        let cfg = Cfg::build(code)?;
        let dot = cfg.to_dot(types)?;

        if let Some(cfg_dir) = args.get_one::<String>("output") {
            let class_name = types.descriptor(class.type_()).to_java_string();
            write_cfg_file(cfg_dir, &class_name, method, &dot)?;
        } else {
            println!("// {}", PrettyPrinter(method, types));
            println!("{dot}");
        }
    }

    Ok(())
}

fn write_cfg_file<P: AsRef<Path>>(
    base_dir: P,
    class_name: &str,
    method: &Method,
    dot: &str,
) -> EwResult<()> {
    // prepare directory (base_dir/fully_qualified_class_name)
    let mut dir = base_dir.as_ref().to_path_buf();
    dir.push(class_name);
    create_dir_all(&dir)?;

    // overloads are told apart by their uid
    dir.push(format!("{}-{}", method.name(), method.uid()));
    dir.set_extension("dot");
    let mut file = File::create(&dir)?;
    file.write_all(dot.as_bytes())?;
    log::info!("dot output written in {:?}", dir);

    Ok(())
}
