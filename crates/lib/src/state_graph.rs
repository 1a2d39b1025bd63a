//! # State Graph Export
//!
//! Renders the controller's state machine as a Mermaid `stateDiagram-v2`.

use crate::types::TurnState;

/// The transitions of the controller, in declaration order.
pub fn transitions() -> Vec<(TurnState, TurnState)> {
    TurnState::ALL
        .iter()
        .flat_map(|from| from.successors().iter().map(move |to| (*from, *to)))
        .collect()
}

pub fn to_mermaid() -> String {
    let mut out = String::from("stateDiagram-v2\n");
    out.push_str(&format!("    [*] --> {}\n", TurnState::Classify));
    for (from, to) in transitions() {
        out.push_str(&format!("    {from} --> {to}\n"));
    }
    for terminal in TurnState::ALL.iter().filter(|s| s.is_terminal()) {
        out.push_str(&format!("    {terminal} --> [*]\n"));
    }
    out
}
