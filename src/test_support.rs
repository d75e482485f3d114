//! Fakes shared by the model tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{oneshot, watch};

use crate::api::{JobsApi, JobsRequest};
use crate::auth::AuthSession;
use crate::error::{ApiError, ApiResult};
use crate::models::{JobDetail, JobDetailPage, JobSummary, LifeAtCompany, Profile};

type Gate<T> = oneshot::Receiver<ApiResult<T>>;

/// Records every call; each call waits on the next queued gate, or
/// answers with an empty success when none is queued.
#[derive(Default)]
pub struct FakeApi {
    pub calls: Mutex<Vec<(String, Option<String>)>>,
    job_gates: Mutex<VecDeque<Gate<Vec<JobSummary>>>>,
    detail_gates: Mutex<VecDeque<Gate<JobDetailPage>>>,
}

impl FakeApi {
    pub fn gate_jobs(&self) -> oneshot::Sender<ApiResult<Vec<JobSummary>>> {
        let (tx, rx) = oneshot::channel();
        self.job_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn gate_detail(&self) -> oneshot::Sender<ApiResult<JobDetailPage>> {
        let (tx, rx) = oneshot::channel();
        self.detail_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(String, Option<String>)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

async fn wait_gate<T>(gate: Option<Gate<T>>, empty: T) -> ApiResult<T> {
    match gate {
        Some(rx) => rx.await.unwrap_or_else(|_| {
            Err(ApiError::Status { status: 0, body: "gate dropped".to_string() })
        }),
        None => Ok(empty),
    }
}

#[async_trait]
impl JobsApi for FakeApi {
    async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        self.calls.lock().unwrap().push((format!("login {}", username), None));
        if password == "secret" {
            Ok(format!("token-for-{}", username))
        } else {
            Err(ApiError::Rejected("username and password didn't match".to_string()))
        }
    }

    async fn list_jobs(
        &self,
        request: &JobsRequest,
        token: Option<&str>,
    ) -> ApiResult<Vec<JobSummary>> {
        let query: Vec<String> = request
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push((format!("/jobs?{}", query.join("&")), token.map(str::to_string)));
        let gate = self.job_gates.lock().unwrap().pop_front();
        wait_gate(gate, Vec::new()).await
    }

    async fn job_details(&self, id: &str, token: Option<&str>) -> ApiResult<JobDetailPage> {
        self.calls
            .lock()
            .unwrap()
            .push((format!("/jobs/{}", id), token.map(str::to_string)));
        let gate = self.detail_gates.lock().unwrap().pop_front();
        wait_gate(gate, sample_page(id)).await
    }

    async fn profile(&self, token: Option<&str>) -> ApiResult<Profile> {
        self.calls
            .lock()
            .unwrap()
            .push(("/profile".to_string(), token.map(str::to_string)));
        Ok(Profile {
            name: "Rahul Attuluri".to_string(),
            profile_image_url: None,
            short_bio: "Lead Software Developer".to_string(),
        })
    }
}

pub fn sample_job(id: &str) -> JobSummary {
    JobSummary {
        id: id.to_string(),
        title: format!("Job {}", id),
        company_logo_url: None,
        employment_type: "Full Time".to_string(),
        description: "Build things".to_string(),
        location: "Hyderabad".to_string(),
        package_per_annum: "10 LPA".to_string(),
        rating: Some(4.0),
        skills: Vec::new(),
    }
}

pub fn sample_page(id: &str) -> JobDetailPage {
    JobDetailPage {
        job: JobDetail {
            summary: sample_job(id),
            apply_link: Some("https://apply.example".to_string()),
            life_at_company: LifeAtCompany {
                description: "Nice".to_string(),
                image_url: None,
            },
        },
        similar_jobs: vec![sample_job("s1")],
    }
}

pub fn session(token: Option<&str>) -> (watch::Sender<AuthSession>, watch::Receiver<AuthSession>) {
    watch::channel(AuthSession {
        token: token.map(str::to_string),
        initializing: false,
    })
}
