mod constants;
pub use constants::{LATEST_TAG, READ_ONLY_ENV_KEY, READ_ONLY_ENV_VALUE};

mod kv;
pub use kv::KeyValue;

mod policy;
pub use policy::RetentionPolicy;

mod policy_override;
pub use policy_override::{PolicyDecodeError, PolicyOverride};

mod tag_record;
pub use tag_record::{DeletionCandidate, TagRecord};

mod process_record;
pub use process_record::ProcessRecord;
