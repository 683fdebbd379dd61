//! 网页构建：生成/校验循环及其模型驱动的生产者、校验者

pub mod coordinator;
pub mod creator;
pub mod determiner;
pub mod html;

pub use coordinator::{
    section_instruction, GenerationLoop, LoopEvent, LoopPhase, LoopReport, Producer, Validator,
    Verdict,
};
pub use creator::CreatorProducer;
pub use determiner::DeterminerValidator;
