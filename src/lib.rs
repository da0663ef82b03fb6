#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod programs;
pub mod record;
pub mod sink;
pub mod source;
pub mod types;

pub use classifier::{Classification, ProgramDecoder, classify, decoder_for};
pub use config::{Config, load_config};
pub use error::Error;
pub use normalize::{BlockContext, balance_delta, normalize, parse_instructions};
pub use pipeline::{
    Granularity, Pipeline, PipelineOptions, PipelineOutput, PipelineReport, records_from_block,
    target_slots,
};
pub use programs::{DecodedInstruction, EventType, Program, TransferDetail};
pub use record::{CanonicalTransactionRecord, ParsedInstructionRecord, Record};
pub use sink::{JsonFileSink, RecordFilter, RecordSink, emit, filter_records};
pub use source::{BlockSource, RpcBlockSource};
pub use types::{RawBlock, RawInstruction, RawTransaction};
