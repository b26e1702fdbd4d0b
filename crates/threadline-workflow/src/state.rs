/// The mapping of arbitrary data threaded through a run.
///
/// A run owns its state exclusively. The engine clones the caller's initial
/// state before the first step and hands it to each node by value.
pub type State = serde_json::Map<String, serde_json::Value>;
