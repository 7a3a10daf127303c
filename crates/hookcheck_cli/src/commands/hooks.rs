//! Hooks command - lists the hooks scenarios can name.

use hookcheck_core::prelude::*;

use super::context::HarnessContext;
use crate::HooksArgs;
use crate::ui::{colors, pluralise_word, print_command_header};

const NAME_WIDTH: usize = 20;
const STAGE_WIDTH: usize = 20;

/// Executes the `hookcheck hooks` command.
pub fn run(args: &HooksArgs) -> super::Result {
    let context = HarnessContext::load(&args.config)?;
    let registry = context.registry()?;

    print_command_header("hooks");

    for hook in registry.iter() {
        print_hook(hook);
    }

    let count = registry.len();
    println!();
    println!(
        "{}",
        colors::muted().apply_to(format!("{count} {}", pluralise_word(count, "hook", "hooks")))
    );

    Ok(())
}

fn print_hook(hook: &HookRef) {
    let source = match &hook.source {
        HookSource::Script(_) => colors::muted().apply_to("inline script".to_string()),
        HookSource::File(path) => colors::secondary().apply_to(path.display().to_string()),
    };

    println!(
        "  {}  {}  {}",
        colors::accent().apply_to(format!("{:<NAME_WIDTH$}", hook.name)),
        colors::muted().apply_to(format!("{:<STAGE_WIDTH$}", hook.stage)),
        source
    );
}
