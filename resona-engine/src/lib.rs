mod allocator;
mod banks;
mod config;
mod controller;
mod diagnostics;
mod dynamics;
mod engine;
mod error;
pub mod events;
mod messages;
mod node;
mod param_value;
pub mod params;
pub mod processor;
mod renderer;
pub mod voice;

pub use crate::allocator::{AllocError, Allocation, VoiceAllocator};
pub use crate::banks::BankId;
pub use crate::config::{EngineConfig, RetriggerPolicy, StealPolicy, TieBreak};
pub use crate::controller::Controller;
pub use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use crate::engine::Engine;
pub use crate::error::{Error, Result};
pub use crate::events::{Event, ExcitationEvent, NoteEvent, NoteId, NoteKind, Pitch, StopTarget};
pub use crate::node::SynthGraphNode;
pub use crate::param_value::ParamValue;
pub use crate::params::{Param, ParamDescriptor, ParamSnapshot};
pub use crate::processor::{NodeDescriptor, Processor, ProcessorContext};
pub use crate::renderer::Renderer;

pub use resona_dsp as dsp;
