//! 单轮查询的主循环
//!
//! 从会话当前掌握对话的智能体开始：Plan -> 解析输出 -> 文本回复 / Tool Call / 转交 / 生成循环，
//! 直到产出本轮终止事件。可恢复错误经 RecoveryEngine 转成提示喂回模型；模型调用次数受 max_agent_steps 限制。

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::{render_instruction, AgentKind, AgentSpec, AgentTree};
use crate::builder::{CreatorProducer, DeterminerValidator, GenerationLoop, LoopEvent};
use crate::config::GenerationSection;
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::LlmClient;
use crate::react::events::{Content, ContentRole, Event, EventActions, Part};
use crate::react::planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
use crate::session::{Message, OutputKey, Session, StateRecord};
use crate::tools::{tool_call_schema_json, ToolContext, ToolExecutor, TRANSFER_TOOL_NAME};

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 运行时事件通道的发送端
pub type EventSender = mpsc::Sender<Result<Event, AgentError>>;

/// 单步结果
#[derive(Debug, PartialEq)]
enum StepOutcome {
    /// 同一智能体继续下一步
    Continue,
    /// 控制权切换到另一个智能体
    Switch(String),
    /// 本轮已产出终止事件
    Finished,
}

/// 单轮查询的执行上下文
pub struct TurnRunner<'a> {
    tree: &'a AgentTree,
    llm: Arc<dyn LlmClient>,
    planner: Planner,
    executor: Arc<ToolExecutor>,
    recovery: RecoveryEngine,
    generation: &'a GenerationSection,
    cancel: CancellationToken,
    invocation_id: String,
    tx: &'a EventSender,
}

impl<'a> TurnRunner<'a> {
    pub fn new(
        tree: &'a AgentTree,
        llm: Arc<dyn LlmClient>,
        executor: Arc<ToolExecutor>,
        generation: &'a GenerationSection,
        tx: &'a EventSender,
    ) -> Self {
        Self {
            tree,
            planner: Planner::new(llm.clone()),
            llm,
            executor,
            recovery: RecoveryEngine::new(),
            generation,
            cancel: CancellationToken::new(),
            invocation_id: format!("e-{}", uuid::Uuid::new_v4()),
            tx,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// 处理一条用户输入，直到发出终止事件
    pub async fn run(&self, session: &mut Session, content: Content) -> Result<(), AgentError> {
        session.history.begin_turn(Message::user(content.text()));
        session.touch();

        let mut agent = session
            .active_agent
            .clone()
            .filter(|name| self.tree.get(name).is_some())
            .unwrap_or_else(|| self.tree.root().to_string());
        let mut steps = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let spec = self
                .tree
                .get(&agent)
                .ok_or_else(|| AgentError::UnknownAgent(agent.clone()))?;

            let outcome = if spec.is_loop() {
                self.run_generation(spec, session).await
            } else {
                self.llm_step(spec, session, &mut steps).await
            };

            match outcome {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Switch(next)) => {
                    tracing::info!(from = %agent, to = %next, "control transferred");
                    agent = next;
                }
                Ok(StepOutcome::Finished) => {
                    // 循环智能体结束后由父智能体接手下一轮
                    let keep = if spec.is_loop() {
                        self.tree.parent_of(&agent)
                    } else {
                        Some(agent.as_str())
                    };
                    session.active_agent = keep
                        .filter(|name| *name != self.tree.root())
                        .map(String::from);
                    session.touch();
                    return Ok(());
                }
                Err(e) => {
                    let prompt = self.recover(e)?;
                    session.history.push(Message::user(prompt));
                }
            }
        }
    }

    fn recover(&self, err: AgentError) -> Result<String, AgentError> {
        match self.recovery.handle(&err) {
            RecoveryAction::RetryWithPrompt(prompt) => {
                tracing::warn!(error = %err, "recoverable error, retrying with prompt");
                Ok(prompt)
            }
            RecoveryAction::Abort => {
                tracing::error!(error = %err, "turn aborted");
                Err(err)
            }
        }
    }

    fn event(&self, author: &str) -> Event {
        Event::new(self.invocation_id.clone(), author)
    }

    /// 发送事件；消费端已断开时终止本轮
    async fn emit(&self, event: Event) -> Result<(), AgentError> {
        tracing::debug!(
            author = %event.author,
            is_final = event.is_final_response(),
            "emit event"
        );
        self.tx
            .send(Ok(event))
            .await
            .map_err(|_| AgentError::Cancelled)
    }

    /// 拼 system prompt：渲染后的指令 + 工具目录 + 可转交的智能体 + tool call 格式
    fn system_prompt(&self, spec: &AgentSpec, state: &StateRecord, allow_transfer: bool) -> String {
        let mut prompt = render_instruction(&spec.instruction, state);
        let AgentKind::Llm {
            tools, agent_tools, ..
        } = &spec.kind
        else {
            return prompt;
        };

        let targets = if allow_transfer {
            self.tree.transfer_targets(&spec.name)
        } else {
            Vec::new()
        };

        let mut catalogue: Vec<Value> = tools
            .iter()
            .filter_map(|name| self.executor.get_tool(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect();
        for (tool, agent) in agent_tools {
            let description = self
                .tree
                .get(agent)
                .map(|s| s.description.as_str())
                .unwrap_or_default();
            catalogue.push(serde_json::json!({
                "name": tool,
                "description": description,
                "parameters": {
                    "type": "object",
                    "properties": { "request": { "type": "string" } },
                    "required": ["request"]
                },
            }));
        }
        if !targets.is_empty() {
            if let Some(tool) = self.executor.get_tool(TRANSFER_TOOL_NAME) {
                catalogue.push(serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                }));
            }
        }

        if !catalogue.is_empty() {
            prompt.push_str("\n\n## Tools\n");
            prompt.push_str(
                "To call a tool, reply with exactly one JSON object and nothing else, matching this schema:\n",
            );
            prompt.push_str(&tool_call_schema_json());
            prompt.push_str("\n\nAvailable tools:\n");
            prompt.push_str(
                &serde_json::to_string_pretty(&catalogue).unwrap_or_else(|_| "[]".to_string()),
            );
        }
        if !targets.is_empty() {
            prompt.push_str("\n\n## Agents you can transfer to\n");
            for target in &targets {
                let description = self
                    .tree
                    .get(target)
                    .map(|s| s.description.as_str())
                    .unwrap_or_default();
                prompt.push_str(&format!("- {target}: {description}\n"));
            }
        }
        prompt.push_str("\n\nOtherwise reply to the user in plain text.");
        prompt
    }

    async fn plan(&self, messages: &[Message], system: &str) -> Result<String, AgentError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            r = self.planner.plan_with_system(messages, system) => r,
        }
    }

    async fn execute(
        &self,
        tool: &str,
        args: Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Value, AgentError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            r = self.executor.execute(tool, args, ctx) => r,
        }
    }

    /// 对话型智能体的一步：调用模型并处理回复
    async fn llm_step(
        &self,
        spec: &AgentSpec,
        session: &mut Session,
        steps: &mut usize,
    ) -> Result<StepOutcome, AgentError> {
        let AgentKind::Llm {
            output_key,
            returns_to_parent,
            ..
        } = &spec.kind
        else {
            return Err(AgentError::UnknownAgent(spec.name.clone()));
        };
        take_step(steps, self.generation.max_agent_steps)?;

        let system = self.system_prompt(spec, &session.state, true);
        let output = self.plan(session.history.messages(), &system).await?;
        session.history.push(Message::assistant(output.clone()));

        match parse_llm_output(&output)? {
            PlannerOutput::Response(text) => {
                let mut event = self.event(&spec.name).with_content(Content::model_text(&text));
                let Some(key) = output_key else {
                    self.emit(event.complete()).await?;
                    return Ok(StepOutcome::Finished);
                };
                session.state.apply_output(*key, &text)?;
                event.actions.state_delta = state_delta(&session.state, *key);
                if !*returns_to_parent {
                    self.emit(event.complete()).await?;
                    return Ok(StepOutcome::Finished);
                }
                self.emit(event).await?;
                session.history.push(Message::user(format!(
                    "[{}] stored its result in '{}'. Continue with the next step.",
                    spec.name,
                    key.name()
                )));
                let parent = self
                    .tree
                    .parent_of(&spec.name)
                    .unwrap_or(self.tree.root())
                    .to_string();
                Ok(StepOutcome::Switch(parent))
            }
            PlannerOutput::ToolCall(call) => self.tool_step(spec, call, session, steps).await,
        }
    }

    async fn tool_step(
        &self,
        spec: &AgentSpec,
        call: ToolCall,
        session: &mut Session,
        steps: &mut usize,
    ) -> Result<StepOutcome, AgentError> {
        let AgentKind::Llm {
            tools, agent_tools, ..
        } = &spec.kind
        else {
            return Err(AgentError::UnknownAgent(spec.name.clone()));
        };
        self.emit(self.event(&spec.name).with_content(function_call(&call)))
            .await?;

        if call.tool == TRANSFER_TOOL_NAME {
            let mut actions = EventActions::default();
            let mut ctx = ToolContext::new(&spec.name, &mut session.state, &mut actions);
            self.execute(&call.tool, call.args, &mut ctx).await?;
            let target = actions.transfer_to_agent.clone().unwrap_or_default();
            if !self.tree.transfer_targets(&spec.name).contains(&target) {
                return Err(AgentError::UnknownAgent(target));
            }
            self.emit(self.event(&spec.name).with_actions(actions)).await?;
            session.history.push(Message::user(format!(
                "[{}] transferred the conversation to {}.",
                spec.name, target
            )));
            return Ok(StepOutcome::Switch(target));
        }

        if let Some((_, wrapped)) = agent_tools.iter().find(|(tool, _)| *tool == call.tool) {
            let wrapped = self
                .tree
                .get(wrapped)
                .ok_or_else(|| AgentError::UnknownAgent(wrapped.clone()))?;
            let result = self
                .run_agent_tool(wrapped, &call.args, &mut session.state, steps)
                .await?;
            let observation = self
                .observe(&spec.name, &call.tool, result, EventActions::default())
                .await?;
            session.history.push(observation);
            return Ok(StepOutcome::Continue);
        }

        if !tools.contains(&call.tool) {
            return Err(AgentError::HallucinatedTool(call.tool));
        }
        let mut actions = EventActions::default();
        let result = {
            let mut ctx = ToolContext::new(&spec.name, &mut session.state, &mut actions);
            self.execute(&call.tool, call.args, &mut ctx).await?
        };
        let observation = self.observe(&spec.name, &call.tool, result, actions).await?;
        session.history.push(observation);
        Ok(StepOutcome::Continue)
    }

    /// 发出 function response 事件，返回写回对话的 Observation
    async fn observe(
        &self,
        author: &str,
        tool: &str,
        result: Value,
        actions: EventActions,
    ) -> Result<Message, AgentError> {
        let observation = result.to_string();
        tracing::info!(
            agent = %author,
            tool = %tool,
            observation = %preview(&observation, OBSERVATION_PREVIEW_CHARS),
            "tool observation"
        );
        let message = Message::user(format!("Observation from {tool}: {observation}"));
        let content = Content {
            role: ContentRole::User,
            parts: vec![Part::FunctionResponse {
                name: tool.to_string(),
                response: result,
            }],
        };
        self.emit(self.event(author).with_content(content).with_actions(actions))
            .await?;
        Ok(message)
    }

    /// 以工具形式调用另一个智能体：独立对话，直到它给出文本输出
    async fn run_agent_tool(
        &self,
        agent: &AgentSpec,
        args: &Value,
        state: &mut StateRecord,
        steps: &mut usize,
    ) -> Result<Value, AgentError> {
        let AgentKind::Llm {
            tools, output_key, ..
        } = &agent.kind
        else {
            return Err(AgentError::UnknownAgent(agent.name.clone()));
        };
        let request = args
            .get("request")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| args.to_string());
        tracing::info!(agent = %agent.name, request = %request, "agent tool invoked");
        let mut messages = vec![Message::user(request)];

        loop {
            if self.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            take_step(steps, self.generation.max_agent_steps)?;
            let system = self.system_prompt(agent, state, false);
            let output = self.plan(&messages, &system).await?;
            messages.push(Message::assistant(output.clone()));

            let call = match parse_llm_output(&output) {
                Ok(PlannerOutput::Response(text)) => {
                    let mut event = self.event(&agent.name).with_content(Content::model_text(&text));
                    let value = match output_key {
                        Some(key) => {
                            if let Err(e) = state.apply_output(*key, &text) {
                                messages.push(Message::user(self.recover(e)?));
                                continue;
                            }
                            event.actions.state_delta = state_delta(state, *key);
                            state_value(state, *key)
                        }
                        None => Value::String(text),
                    };
                    self.emit(event).await?;
                    return Ok(value);
                }
                Ok(PlannerOutput::ToolCall(call)) => call,
                Err(e) => {
                    messages.push(Message::user(self.recover(e)?));
                    continue;
                }
            };

            self.emit(self.event(&agent.name).with_content(function_call(&call)))
                .await?;
            if !tools.contains(&call.tool) {
                let prompt = self.recover(AgentError::HallucinatedTool(call.tool))?;
                messages.push(Message::user(prompt));
                continue;
            }
            let mut actions = EventActions::default();
            let result = {
                let mut ctx = ToolContext::new(&agent.name, state, &mut actions);
                self.execute(&call.tool, call.args, &mut ctx).await
            };
            match result {
                Ok(result) => {
                    let observation = self.observe(&agent.name, &call.tool, result, actions).await?;
                    messages.push(observation);
                }
                Err(e) => messages.push(Message::user(self.recover(e)?)),
            }
        }
    }

    /// 循环智能体：生成/校验循环跑到 Done，完成后控制权回到父智能体
    async fn run_generation(
        &self,
        spec: &AgentSpec,
        session: &mut Session,
    ) -> Result<StepOutcome, AgentError> {
        let AgentKind::Loop {
            producer,
            validator,
        } = &spec.kind
        else {
            return Err(AgentError::UnknownAgent(spec.name.clone()));
        };
        let producer_spec = self
            .tree
            .get(producer)
            .ok_or_else(|| AgentError::UnknownAgent(producer.clone()))?;
        let validator_spec = self
            .tree
            .get(validator)
            .ok_or_else(|| AgentError::UnknownAgent(validator.clone()))?;
        let creator = CreatorProducer::new(self.llm.clone(), producer_spec.instruction.clone());
        let determiner = DeterminerValidator::new(
            self.llm.clone(),
            validator_spec.instruction.clone(),
            self.executor.clone(),
        );

        tracing::info!(
            agent = %spec.name,
            sections = session.state.section_plan.len(),
            max_iterations = self.generation.max_iterations,
            "generation loop started"
        );
        let (loop_tx, mut loop_rx) = mpsc::unbounded_channel();
        let generation = GenerationLoop::new(self.generation.max_iterations)
            .with_cancel(self.cancel.clone())
            .with_events(loop_tx);
        let mut actions = EventActions::default();
        let state = &mut session.state;
        let actions_ref = &mut actions;
        let (creator_ref, determiner_ref) = (&creator, &determiner);
        // 循环结束时 generation（连同事件发送端）被 drop，转发端随之退出
        let run = async move {
            generation
                .run(creator_ref, determiner_ref, state, actions_ref)
                .await
        };
        let forward = async {
            while let Some(ev) = loop_rx.recv().await {
                let event = self.loop_event(spec, producer, validator, ev);
                if self.emit(event).await.is_err() {
                    self.cancel.cancel();
                }
            }
        };
        let (result, ()) = tokio::join!(run, forward);

        match result {
            Ok(report) => {
                tracing::info!(
                    agent = %spec.name,
                    iterations = report.iterations,
                    repairs = report.repairs,
                    premature_rejections = report.premature_rejections,
                    "generation loop finished"
                );
                let code = session.state.generated_code.clone().unwrap_or_default();
                session.history.push(Message::user(format!(
                    "[{}] The build loop finished after {} iterations. generated_code is final:\n{}",
                    spec.name, report.iterations, code
                )));
                let parent = self
                    .tree
                    .parent_of(&spec.name)
                    .unwrap_or(self.tree.root())
                    .to_string();
                Ok(StepOutcome::Switch(parent))
            }
            Err(e) if e.is_loop_fatal() => {
                tracing::error!(agent = %spec.name, error = %e, "generation loop escalated");
                let actions = EventActions {
                    escalate: true,
                    ..Default::default()
                };
                self.emit(
                    self.event(&spec.name)
                        .with_actions(actions)
                        .with_error(e.to_string())
                        .complete(),
                )
                .await?;
                Ok(StepOutcome::Finished)
            }
            Err(e) => Err(e),
        }
    }

    fn loop_event(&self, spec: &AgentSpec, producer: &str, validator: &str, ev: LoopEvent) -> Event {
        match ev {
            LoopEvent::Produced {
                iteration,
                code_len,
                pending,
            } => self.event(producer).with_content(Content::model_text(format!(
                "Iteration {iteration}: document updated ({code_len} chars), pending sections: [{}]",
                pending.join(", ")
            ))),
            LoopEvent::Instructed { instruct, .. } => {
                let mut actions = EventActions::default();
                actions
                    .state_delta
                    .insert("instruct".to_string(), Value::String(instruct.clone()));
                self.event(validator)
                    .with_content(Content::model_text(instruct))
                    .with_actions(actions)
            }
            LoopEvent::PrematureCompletion { iteration, pending } => {
                self.event(validator).with_error(format!(
                    "Iteration {iteration}: completion rejected, pending sections: [{}]",
                    pending.join(", ")
                ))
            }
            LoopEvent::Completed { iterations } => {
                let actions = EventActions {
                    escalate: true,
                    ..Default::default()
                };
                self.event(&spec.name)
                    .with_content(Content::model_text(format!(
                        "Build complete after {iterations} iterations."
                    )))
                    .with_actions(actions)
            }
        }
    }
}

fn take_step(steps: &mut usize, max: usize) -> Result<(), AgentError> {
    if *steps >= max {
        return Err(AgentError::MaxStepsExceeded(max));
    }
    *steps += 1;
    Ok(())
}

fn function_call(call: &ToolCall) -> Content {
    Content {
        role: ContentRole::Model,
        parts: vec![Part::FunctionCall {
            name: call.tool.clone(),
            args: call.args.clone(),
        }],
    }
}

/// 输出槽位的当前值
fn state_value(state: &StateRecord, key: OutputKey) -> Value {
    match key {
        OutputKey::WebInfoOutput => state.web_info_output.clone().unwrap_or(Value::Null),
        OutputKey::SectionPlan => Value::Object(Map::from(state.section_plan.clone())),
        OutputKey::GeneratedCode => state
            .generated_code
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
        OutputKey::Instruct => state
            .instruct
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn state_delta(state: &StateRecord, key: OutputKey) -> Map<String, Value> {
    let mut delta = Map::new();
    delta.insert(key.name().to_string(), state_value(state, key));
    delta
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
