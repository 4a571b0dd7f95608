pub mod config;
pub mod directory;
pub mod request;
pub mod response;
pub mod tags;

pub use config::{L2Config, LINE_BYTES, NUM_CORES, NUM_WAYS};
pub use directory::{CoreBitmap, Directory, DirectorySnapshot};
pub use request::{L2Request, LineData, LookupOutcome, MemOp};
pub use response::{compute_response, L2Response, RespOp, ResponseStage, StageInputs};
pub use tags::L2TagArray;
