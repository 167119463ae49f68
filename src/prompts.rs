//! Prompts for the narrative pass.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! tests can inspect the prompts without a model.

use crate::tree::TableKind;

/// System prompt for table narratives.
pub const TABLE_SYSTEM_PROMPT: &str = "You are a helpful assistant that converts tables to clear, \
readable narrative paragraphs. Preserve all key information from the table.";

/// System prompt for visual descriptions.
pub const VISUAL_SYSTEM_PROMPT: &str = "You describe figures cut from documents for readers who \
cannot see them. Answer with plain prose only: no headings, no lists of your own, no preamble.";

/// Per-kind instruction for a table narrative.
pub fn table_instruction(kind: TableKind) -> &'static str {
    match kind {
        TableKind::Comparison => {
            "This is a comparison table. Describe the key differences and similarities \
             between the entities being compared."
        }
        TableKind::TimeSeries => {
            "This is a time-series table. Describe the trends, changes, and patterns over time."
        }
        TableKind::Summary => {
            "This is a summary table. Describe the key statistics, totals, and aggregate \
             information."
        }
        TableKind::Data => "Describe the information presented in this table clearly and concisely.",
    }
}

/// User prompt asking for a narrative paragraph of a Markdown table.
pub fn table_prompt(markdown: &str, kind: TableKind) -> String {
    format!(
        "Convert the following markdown table into a clear, readable narrative paragraph.\n\n\
         {}\n\n\
         Preserve all important numerical data, names, and relationships. Write in a flowing, \
         natural style suitable for a textbook.\n\n\
         Table:\n{}\n\n\
         Narrative paragraph:",
        table_instruction(kind),
        markdown
    )
}

/// What a visual region most likely shows, from its node label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualKind {
    Flowchart,
    Diagram,
    Chart,
    Table,
}

impl VisualKind {
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.contains("flow") {
            VisualKind::Flowchart
        } else if label.contains("chart") || label.contains("graph") {
            VisualKind::Chart
        } else if label.contains("table") {
            VisualKind::Table
        } else {
            VisualKind::Diagram
        }
    }

    fn checklist(&self) -> &'static str {
        match self {
            VisualKind::Flowchart => {
                "This is a flowchart. Please describe:\n\
                 1. The process flow from start to end\n\
                 2. Key decision points and branches\n\
                 3. Main steps in logical order\n\
                 4. Overall purpose of the flow"
            }
            VisualKind::Diagram => {
                "This is a diagram. Please describe:\n\
                 1. Main components and their relationships\n\
                 2. Labels and annotations\n\
                 3. Overall structure and organization\n\
                 4. Key concepts being illustrated"
            }
            VisualKind::Chart => {
                "This is a chart/graph. Please describe:\n\
                 1. Type of chart (bar, line, pie, etc.)\n\
                 2. Axes labels and data ranges\n\
                 3. Key trends or patterns\n\
                 4. Main insights from the data"
            }
            VisualKind::Table => {
                "This is a table. Please describe:\n\
                 1. Column headers and row labels\n\
                 2. Key data points\n\
                 3. Patterns or trends in the data\n\
                 4. Overall purpose of the table"
            }
        }
    }
}

/// User prompt sent together with a cropped region.
pub fn visual_prompt(kind: VisualKind) -> String {
    format!(
        "Describe this flowchart or diagram in detail.\n\n{}\n\n\
         Provide a clear narrative description suitable for someone who cannot see the image.",
        kind.checklist()
    )
}
