use rollcall_core::Config;
use rollcall_discord::Session;
use rollcall_engine::EngineTuning;
use rollcall_store::Store;

/// Everything a tool handler needs, passed explicitly. There is no global
/// bot handle anywhere in the process.
pub struct Context {
    pub config: Config,
    pub store: Store,
    pub session: Session,
    pub tuning: EngineTuning,
}

impl Context {
    pub fn new(config: Config, store: Store) -> Self {
        let session = Session::new(&config);
        Self {
            config,
            store,
            session,
            tuning: EngineTuning::default(),
        }
    }
}
