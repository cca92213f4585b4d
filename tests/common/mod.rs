//! 测试用的脚本化协作者
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_chain_solver::error::{BackendError, FetchError, SubmitError};
use quiz_chain_solver::models::{PromptContext, SubmitRequest, Verdict};
use quiz_chain_solver::services::{ModelBackend, PageFetcher, Submitter};
use quiz_chain_solver::{ChainRunner, Identity, QuizFlow, StepPolicy};

pub const U1: &str = "https://quiz.example/q/1";
pub const U2: &str = "https://quiz.example/q/2";
pub const U3: &str = "https://quiz.example/q/3";
pub const SUBMIT_URL: &str = "https://quiz.example/submit";

pub fn default_raw_answer() -> String {
    format!(r#"{{"submit_url": "{}", "answer": 42}}"#, SUBMIT_URL)
}

/// 按顺序返回预设结果的页面抓取；脚本用完后返回固定文本
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<String, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Vec<Result<String, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(format!("Quiz at {}. Post your answer to {}", url, SUBMIT_URL)))
    }
}

/// 按顺序返回预设输出的模型后端；脚本用完后返回默认答案
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    delay: Duration,
    calls: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Vec<Result<String, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn solve(&self, _context: &PromptContext) -> Result<String, BackendError> {
        *self.calls.lock().unwrap() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(default_raw_answer()))
    }
}

/// 按顺序返回预设判定的提交端点，每一步可带延迟
#[derive(Default)]
pub struct ScriptedSubmitter {
    script: Mutex<VecDeque<(Duration, Result<Verdict, SubmitError>)>>,
    requests: Mutex<Vec<SubmitRequest>>,
}

impl ScriptedSubmitter {
    pub fn with_verdicts(verdicts: Vec<Verdict>) -> Arc<Self> {
        Self::with_script(
            verdicts
                .into_iter()
                .map(|v| (Duration::ZERO, Ok(v)))
                .collect(),
        )
    }

    pub fn with_script(script: Vec<(Duration, Result<Verdict, SubmitError>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SubmitRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(&self, request: &SubmitRequest) -> Result<Verdict, SubmitError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(SubmitError::RequestFailed {
                endpoint: request.submit_url.clone(),
                message: "脚本已用完".to_string(),
            }),
        }
    }
}

pub fn server_error() -> SubmitError {
    SubmitError::ServerError {
        endpoint: SUBMIT_URL.to_string(),
        status: 502,
        body: "bad gateway".to_string(),
    }
}

pub fn identity() -> Identity {
    Identity {
        email: "student@example.com".to_string(),
        secret: "s3cret".to_string(),
    }
}

pub fn runner(
    fetcher: Arc<ScriptedFetcher>,
    backend: Arc<ScriptedBackend>,
    submitter: Arc<ScriptedSubmitter>,
    policy: StepPolicy,
) -> ChainRunner {
    let flow = QuizFlow::new(fetcher, backend, submitter, policy);
    ChainRunner::new(Arc::new(flow), identity())
}
