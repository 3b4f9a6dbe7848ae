//! Single-shot validation of a visual's config and schema.

use anyhow::{Result, bail};

use crate::config::VisualConfig;
use crate::schema;
use crate::{log, logger};

use super::args::{Cli, ValidateArgs};

pub fn run(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    let visual_path = if args.visual.is_absolute() {
        args.visual.clone()
    } else {
        cli.root.join(&args.visual)
    };

    let mut failed = false;

    match VisualConfig::load(&visual_path) {
        Ok((config, _raw)) => match config.validate().into_result() {
            Ok(()) => log!("validate"; "{} ok", crate::config::CONFIG_FILE),
            Err(diags) => {
                eprintln!("{diags}");
                failed = true;
            }
        },
        Err(e) => {
            logger::status_error(crate::config::CONFIG_FILE, &format!("{e:#}"));
            failed = true;
        }
    }

    match schema::load(&visual_path) {
        Ok(_) => log!("validate"; "{} ok", schema::SCHEMA_FILE),
        Err(e) => {
            logger::status_error(schema::SCHEMA_FILE, &e.to_string());
            failed = true;
        }
    }

    if failed {
        bail!("validation failed for `{}`", visual_path.display());
    }
    Ok(())
}
