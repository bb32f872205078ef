use anyhow::Result;

use schema_annotate::Mode;

use super::RunArgs;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Remove Annotations",
    commands: &[
        "schema-annotate remove                        # Remove blocks for the configured position",
        "schema-annotate remove --position bottom      # Remove blocks appended to model files",
        "schema-annotate -q remove                     # Remove silently",
    ],
}];

pub fn handle_remove(args: RunArgs, output: &OutputManager) -> Result<()> {
    output.heading("Remove Annotations");
    super::run(Mode::Remove, args, output)
}
