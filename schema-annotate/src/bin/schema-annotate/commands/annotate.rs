use anyhow::Result;

use schema_annotate::Mode;

use super::RunArgs;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Annotate Models",
        commands: &[
            "schema-annotate annotate                          # Use .schema-annotate.toml (default: shared schema file)",
            "schema-annotate annotate --position top           # Prepend blocks to each model file",
            "schema-annotate annotate --position bottom        # Append blocks to each model file",
        ],
    },
    ExampleGroup {
        title: "Manifest",
        commands: &[
            "schema-annotate annotate --manifest tmp/models.json   # Read an alternate manifest",
            "schema-annotate --output json annotate                # Print changed files as JSON",
        ],
    },
];

pub fn handle_annotate(args: RunArgs, output: &OutputManager) -> Result<()> {
    output.heading("Annotate");
    super::run(Mode::Annotate, args, output)
}
