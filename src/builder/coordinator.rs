//! 生成/校验循环协调器
//!
//! 显式状态机：Produce -> Validate -> (Produce | Done)。
//! - Produce：生产者读取当前状态，返回新的 generated_code（只有这一步写 generated_code）
//! - Validate：校验者对照 section_plan 给出下一条指令，或宣告完成
//! - Done：终态
//!
//! 一次迭代 = 一次 Produce -> Validate 往返；超过 max_iterations 返回 MaxIterationsExceeded。
//! 仍有分段未生成时的完成宣告会被拒绝，替换为下一个待生成分段的指令。

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::builder::html::pending_sections;
use crate::core::AgentError;
use crate::react::events::EventActions;
use crate::session::StateRecord;
use crate::tools::signal_completion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Produce,
    Validate,
    Done,
}

/// 校验结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 继续：下一条给生产者的指令（修正当前分段或生成下一个分段）；空串表示由协调器补默认指令
    Continue { instruct: String },
    /// 全部分段已完成
    Complete,
}

/// 生产者：根据当前状态给出完整的新文档
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, state: &StateRecord) -> Result<String, AgentError>;
}

/// 校验者：检查文档并给出结论（可通过工具读写状态，但不得写 generated_code）
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, state: &mut StateRecord) -> Result<Verdict, AgentError>;
}

/// 循环进度事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    Produced {
        iteration: usize,
        code_len: usize,
        pending: Vec<String>,
    },
    Instructed {
        iteration: usize,
        instruct: String,
        repair: bool,
    },
    PrematureCompletion {
        iteration: usize,
        pending: Vec<String>,
    },
    Completed {
        iterations: usize,
    },
}

/// 循环统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopReport {
    pub iterations: usize,
    /// 上一条指令未被执行到位、校验者要求重做的次数
    pub repairs: usize,
    pub premature_rejections: usize,
    pub completion_signals: usize,
}

/// 分段默认指令（校验者未给出有效指令或过早宣告完成时使用）
pub fn section_instruction(state: &StateRecord, section: &str) -> String {
    let content = state.section_plan.get(section).unwrap_or("");
    format!("Add the '{section}' section. Content: {content}")
}

fn send_event(tx: &Option<UnboundedSender<LoopEvent>>, event: LoopEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}

fn pending_of(state: &StateRecord) -> Vec<String> {
    pending_sections(
        state.generated_code.as_deref().unwrap_or(""),
        &state.section_plan,
    )
}

/// 生成循环
pub struct GenerationLoop {
    max_iterations: usize,
    cancel: CancellationToken,
    events: Option<UnboundedSender<LoopEvent>>,
}

impl GenerationLoop {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 运行到 Done；完成时在 actions 上置 escalate 并清空 instruct
    pub async fn run(
        &self,
        producer: &dyn Producer,
        validator: &dyn Validator,
        state: &mut StateRecord,
        actions: &mut EventActions,
    ) -> Result<LoopReport, AgentError> {
        let mut phase = LoopPhase::Produce;
        let mut report = LoopReport::default();
        let mut pending_before: Vec<String> = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            match phase {
                LoopPhase::Produce => {
                    if report.iterations >= self.max_iterations {
                        tracing::warn!(
                            max = self.max_iterations,
                            pending = ?pending_of(state),
                            "generation loop hit iteration cap"
                        );
                        return Err(AgentError::MaxIterationsExceeded(self.max_iterations));
                    }
                    report.iterations += 1;
                    pending_before = pending_of(state);

                    let code = tokio::select! {
                        _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                        r = producer.produce(state) => r?,
                    };
                    state.generated_code = Some(code);
                    let pending = pending_of(state);
                    tracing::info!(
                        iteration = report.iterations,
                        pending = pending.len(),
                        "produce step done"
                    );
                    send_event(
                        &self.events,
                        LoopEvent::Produced {
                            iteration: report.iterations,
                            code_len: state.generated_code.as_ref().map_or(0, String::len),
                            pending,
                        },
                    );
                    phase = LoopPhase::Validate;
                }
                LoopPhase::Validate => {
                    let verdict = tokio::select! {
                        _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                        r = validator.validate(state) => r?,
                    };
                    let pending = pending_of(state);

                    let verdict = match verdict {
                        Verdict::Continue { instruct } if instruct.trim().is_empty() => {
                            match pending.first() {
                                Some(next) => Verdict::Continue {
                                    instruct: section_instruction(state, next),
                                },
                                None => Verdict::Complete,
                            }
                        }
                        other => other,
                    };

                    match verdict {
                        Verdict::Continue { instruct } => {
                            let repair = report.iterations > 1
                                && state.instruct.is_some()
                                && !pending_before.is_empty()
                                && pending.len() >= pending_before.len();
                            if repair {
                                report.repairs += 1;
                            }
                            tracing::info!(
                                iteration = report.iterations,
                                repair,
                                instruct = %instruct,
                                "validator issued instruction"
                            );
                            state.instruct = Some(instruct.trim().to_string());
                            send_event(
                                &self.events,
                                LoopEvent::Instructed {
                                    iteration: report.iterations,
                                    instruct: instruct.trim().to_string(),
                                    repair,
                                },
                            );
                            phase = LoopPhase::Produce;
                        }
                        Verdict::Complete if !pending.is_empty() => {
                            tracing::warn!(
                                iteration = report.iterations,
                                pending = ?pending,
                                "completion signalled while sections are pending, rejected"
                            );
                            report.premature_rejections += 1;
                            state.instruct = Some(section_instruction(state, &pending[0]));
                            send_event(
                                &self.events,
                                LoopEvent::PrematureCompletion {
                                    iteration: report.iterations,
                                    pending,
                                },
                            );
                            phase = LoopPhase::Produce;
                        }
                        Verdict::Complete => {
                            if signal_completion(actions) {
                                report.completion_signals += 1;
                            }
                            state.instruct = None;
                            tracing::info!(iterations = report.iterations, "generation loop completed");
                            send_event(
                                &self.events,
                                LoopEvent::Completed {
                                    iterations: report.iterations,
                                },
                            );
                            phase = LoopPhase::Done;
                        }
                    }
                }
                LoopPhase::Done => return Ok(report),
            }
        }
    }
}
