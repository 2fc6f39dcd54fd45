//! Types command implementation.

use crate::commands::types::TypesCommand;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use meridian_abstraction::{
    ConceptFamily, Layer, LrGenerator, Param, ParamGenerator, Updater, Worker,
};
use meridian_core::logging;
use meridian_core::{AppContext, Bootstrapper, LogSettings};
use serde_json::{Map, Value, json};

const FAMILIES: &[&str] = &[
    <dyn Layer as ConceptFamily>::NAME,
    <dyn Param as ConceptFamily>::NAME,
    <dyn ParamGenerator as ConceptFamily>::NAME,
    <dyn LrGenerator as ConceptFamily>::NAME,
    <dyn Updater as ConceptFamily>::NAME,
    <dyn Worker as ConceptFamily>::NAME,
];

pub fn execute(command: &TypesCommand) -> Result<()> {
    logging::init(&LogSettings::default(), None).context("Failed to initialize logging")?;

    let context = AppContext::default();
    Bootstrapper::standard()
        .register_builtins(context.registries())
        .context("Bootstrap failed")?;

    let families: Vec<&str> = match command.family.as_deref() {
        Some(family) if FAMILIES.contains(&family) => vec![family],
        Some(family) => {
            let expected = FAMILIES.join(", ");
            bail!("Unknown family '{family}'. Expected one of: {expected}")
        }
        None => FAMILIES.to_vec(),
    };

    if command.json {
        let mut out = Map::new();
        for family in families {
            out.insert(family.to_string(), json!(identifiers(&context, family)));
        }
        println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
        return Ok(());
    }

    for family in families {
        let ids = identifiers(&context, family);
        println!("{} ({})", family.bold().cyan(), ids.len());
        for id in ids {
            println!("  {id}");
        }
    }
    Ok(())
}

fn identifiers(context: &AppContext, family: &str) -> Vec<String> {
    let mut ids: Vec<String> = match family {
        "layer" => context.registry::<dyn Layer>().identifiers(),
        "param" => context.registry::<dyn Param>().identifiers(),
        "param-generator" => context.registry::<dyn ParamGenerator>().identifiers(),
        "lr-generator" => context.registry::<dyn LrGenerator>().identifiers(),
        "updater" => context.registry::<dyn Updater>().identifiers(),
        "worker" => context.registry::<dyn Worker>().identifiers(),
        _ => Vec::new(),
    }
    .into_iter()
    .map(|id| id.to_string())
    .collect();
    ids.sort();
    ids
}
