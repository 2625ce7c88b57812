pub(crate) mod config_runtime;
pub(crate) mod discovery;
pub(crate) mod report;
pub(crate) mod runtime;
pub(crate) mod terminal;
