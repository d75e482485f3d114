use anyhow::{bail, Context, Result};
use reqwest::Url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    fallback_skill_name, JobDetail, JobDetailPage, JobSummary, LifeAtCompany, Profile, Skill,
    FALLBACK_DESCRIPTION, FALLBACK_EMPLOYMENT_TYPE, FALLBACK_LIFE_AT_COMPANY, FALLBACK_LOCATION,
    FALLBACK_PACKAGE, FALLBACK_PROFILE_NAME, FALLBACK_SIMILAR_PACKAGE, FALLBACK_TITLE,
};

// --- Client trait ---

/// The remote job-board API.
///
/// `HttpJobsApi` is the real implementation; tests substitute their own to
/// control timing and outcomes.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn login(&self, username: &str, password: &str) -> ApiResult<String>;

    async fn list_jobs(&self, request: &JobsRequest, token: Option<&str>)
        -> ApiResult<Vec<JobSummary>>;

    async fn job_details(&self, id: &str, token: Option<&str>) -> ApiResult<JobDetailPage>;

    async fn profile(&self, token: Option<&str>) -> ApiResult<Profile>;
}

/// Filter parameters for `GET /jobs`. Empty parts are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobsRequest {
    pub employment_types: Vec<String>,
    pub minimum_package: Option<String>,
    pub search: Option<String>,
}

impl JobsRequest {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.employment_types.is_empty() {
            pairs.push(("employment_type", self.employment_types.join(",")));
        }
        if let Some(min) = self.minimum_package.as_deref().filter(|m| !m.is_empty()) {
            pairs.push(("minimum_package", min.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct JobsResponse {
    jobs: Vec<ApiJob>,
}

#[derive(Debug, Deserialize)]
struct ApiSkill {
    name: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiJob {
    id: String,
    title: Option<String>,
    company_logo_url: Option<String>,
    employment_type: Option<String>,
    job_description: Option<String>,
    location: Option<String>,
    package_per_annum: Option<String>,
    rating: Option<f64>,
    #[serde(default)]
    skills: Option<Vec<ApiSkill>>,
}

#[derive(Debug, Deserialize)]
struct ApiLifeAtCompany {
    description: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiJobDetails {
    #[serde(flatten)]
    job: ApiJob,
    #[serde(alias = "company_website_url")]
    apply_link: Option<String>,
    life_at_company: Option<ApiLifeAtCompany>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    job_details: ApiJobDetails,
    #[serde(default)]
    similar_jobs: Option<Vec<ApiJob>>,
}

#[derive(Debug, Deserialize)]
struct ApiProfile {
    name: Option<String>,
    profile_image_url: Option<String>,
    short_bio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile_details: ApiProfile,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    jwt_token: Option<String>,
    error_msg: Option<String>,
}

// --- Normalization ---

fn normalize_job(job: ApiJob) -> JobSummary {
    let skills = job
        .skills
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, skill)| Skill {
            name: skill.name.unwrap_or_else(|| fallback_skill_name(i)),
            image_url: skill.image_url,
        })
        .collect();

    JobSummary {
        id: job.id,
        title: job.title.unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        company_logo_url: job.company_logo_url,
        employment_type: job
            .employment_type
            .unwrap_or_else(|| FALLBACK_EMPLOYMENT_TYPE.to_string()),
        description: job
            .job_description
            .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string()),
        location: job.location.unwrap_or_else(|| FALLBACK_LOCATION.to_string()),
        package_per_annum: job
            .package_per_annum
            .unwrap_or_else(|| FALLBACK_PACKAGE.to_string()),
        rating: job.rating,
        skills,
    }
}

/// Similar-job cards say "Not disclosed" when the package is missing.
fn normalize_similar_job(job: ApiJob) -> JobSummary {
    let disclosed = job.package_per_annum.is_some();
    let mut summary = normalize_job(job);
    if !disclosed {
        summary.package_per_annum = FALLBACK_SIMILAR_PACKAGE.to_string();
    }
    summary
}

fn normalize_detail(response: DetailResponse) -> JobDetailPage {
    let details = response.job_details;
    let life = details.life_at_company;
    let job = JobDetail {
        summary: normalize_job(details.job),
        apply_link: details.apply_link,
        life_at_company: LifeAtCompany {
            description: life
                .as_ref()
                .and_then(|l| l.description.clone())
                .unwrap_or_else(|| FALLBACK_LIFE_AT_COMPANY.to_string()),
            image_url: life.and_then(|l| l.image_url),
        },
    };
    let similar_jobs = response
        .similar_jobs
        .unwrap_or_default()
        .into_iter()
        .map(normalize_similar_job)
        .collect();
    JobDetailPage { job, similar_jobs }
}

fn normalize_profile(profile: ApiProfile) -> Profile {
    Profile {
        name: profile.name.unwrap_or_else(|| FALLBACK_PROFILE_NAME.to_string()),
        profile_image_url: profile.profile_image_url,
        short_bio: profile.short_bio.unwrap_or_default(),
    }
}

pub(crate) fn parse_jobs(body: &str) -> ApiResult<Vec<JobSummary>> {
    let response: JobsResponse = serde_json::from_str(body)?;
    Ok(response.jobs.into_iter().map(normalize_job).collect())
}

pub(crate) fn parse_job_details(body: &str) -> ApiResult<JobDetailPage> {
    let response: DetailResponse = serde_json::from_str(body)?;
    Ok(normalize_detail(response))
}

pub(crate) fn parse_profile(body: &str) -> ApiResult<Profile> {
    let response: ProfileResponse = serde_json::from_str(body)?;
    Ok(normalize_profile(response.profile_details))
}

// --- HTTP implementation ---

#[derive(Debug, Clone)]
pub struct HttpJobsApi {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpJobsApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid API URL '{}'", config.api_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid API URL '{}': not a base URL", config.api_url);
        }
        Ok(Self { base_url, client })
    }

    /// Base URL with `segments` appended, each percent-encoded as one path
    /// segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder, token: Option<&str>) -> ApiResult<String> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get<T, F>(&self, request: reqwest::RequestBuilder, token: Option<&str>, parse: F) -> ApiResult<T>
    where
        F: FnOnce(&str) -> ApiResult<T>,
    {
        let body = self.send(request, token).await?;
        parse(&body)
    }
}

#[async_trait]
impl JobsApi for HttpJobsApi {
    async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        let request = self
            .client
            .post(self.url(&["login"]))
            .json(&LoginRequest { username, password });

        match self.send(request, None).await {
            Ok(body) => {
                let response: LoginResponse = serde_json::from_str(&body)?;
                match response.jwt_token {
                    Some(token) if !token.is_empty() => Ok(token),
                    _ => Err(ApiError::Rejected(
                        response
                            .error_msg
                            .unwrap_or_else(|| "Login response did not include a token".to_string()),
                    )),
                }
            }
            Err(ApiError::Status { status, body }) => {
                // Bad credentials come back as 4xx with an error_msg
                match serde_json::from_str::<LoginResponse>(&body) {
                    Ok(LoginResponse { error_msg: Some(msg), .. }) => Err(ApiError::Rejected(msg)),
                    _ => Err(ApiError::Status { status, body }),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn list_jobs(
        &self,
        request: &JobsRequest,
        token: Option<&str>,
    ) -> ApiResult<Vec<JobSummary>> {
        let builder = self.client.get(self.url(&["jobs"])).query(&request.query_pairs());
        self.get(builder, token, parse_jobs).await
    }

    async fn job_details(&self, id: &str, token: Option<&str>) -> ApiResult<JobDetailPage> {
        let builder = self.client.get(self.url(&["jobs", id]));
        self.get(builder, token, parse_job_details).await
    }

    async fn profile(&self, token: Option<&str>) -> ApiResult<Profile> {
        let builder = self.client.get(self.url(&["profile"]));
        self.get(builder, token, parse_profile).await
    }
}
