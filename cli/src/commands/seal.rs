use std::fs;

use anyhow::{Context, ensure};
use tracing::info;

use frontr_common::seal;

use crate::commands::SealArgs;

pub fn seal(args: SealArgs) -> anyhow::Result<()> {
    let plaintext = fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    ensure!(!plaintext.is_empty(), "input document is empty");

    let sealed = seal::seal(&plaintext)?;
    fs::write(&args.output, &sealed)
        .with_context(|| format!("write {}", args.output.display()))?;

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        bytes = sealed.len(),
        "target document sealed"
    );
    Ok(())
}
