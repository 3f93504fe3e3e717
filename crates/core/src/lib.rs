pub mod config;
pub mod guide;
pub mod metrics;
pub mod sources;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use guide::{
    Channel, ChannelCache, ChannelError, ChannelSelector, FromProgramRow, Guide, GuideError,
    ProgramAttr, Program, ProgramExtras, ProgramFlags, ProgramRetrieved, RawProgram,
    SearchRequest, TimeSpec,
};
pub use sources::{
    GuideSource, GuideUpdater, GuideWriter, JsonFileSource, ProgramData, SourceUpdater,
    UpdateError, UpdateSummary,
};
pub use store::{
    AttrValue, Filter, GuideStore, ParentFilter, ParentRef, Query, Row, SqliteGuideStore,
    StoreError,
};
