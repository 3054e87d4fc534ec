pub(crate) mod command;
pub(crate) mod output;
pub(crate) mod read;
pub(crate) mod report;
pub(crate) mod scan;
pub(crate) mod session;
pub(crate) mod subscribe;
pub(crate) mod ui;
pub(crate) mod write;

pub use self::command::{
    Args, Command, FakeArgs, LogLevel, OutputFormat, ReadArgs, ScanArgs, SubscribeArgs,
    TargetArgs, WriteArgs,
};
