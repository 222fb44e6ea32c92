use std::collections::HashMap;
use std::io::Cursor;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::tls::Version;
use reqwest::{Method, Proxy};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::hash::classify;
use crate::model::{CreatedTasks, Envelope, Report, ReportFormat, TaskId, TaskRecord, TaskState};

const APPLICATION_JSON: &str = "application/json";

/// What the submission drivers need from a sandbox.
pub trait SandboxApi {
    /// Web root of the sandbox, without a trailing slash.
    fn root(&self) -> &str;

    fn find_tasks_by_hash(&self, hash: &str) -> Result<Vec<TaskId>>;

    fn submit_file(&self, name: &str, bytes: Vec<u8>, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>>;

    fn submit_url(&self, url: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>>;

    fn submit_hash_lookup(&self, hash: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>>;

    fn get_task_status(&self, task_id: &TaskId) -> Result<TaskState>;

    fn analysis_url(&self, task_id: &TaskId) -> String {
        format!("{root}/analysis/{task_id}", root = self.root())
    }
}

/// Fails with [`SandboxError::Transport`] unless the response carries a 2xx status.
pub(crate) fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(SandboxError::Transport { status, url: response.url().to_string() });
    }

    Ok(response)
}

/// URL submissions always get a process memory dump.
fn memory_dump_options(options: Option<&str>) -> String {
    match options.filter(|options| !options.is_empty()) {
        None => "procmemdump=yes".to_owned(),
        Some(options) => format!("process_memory=yes,{options}"),
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    Ok(serde_json::from_value(data)?)
}

pub struct CuckooClient {
    root: String,
    api_root: String,
    credentials: Option<(String, Option<String>)>,
    http: Client,
}

impl CuckooClient {
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        let root = config.root.trim_end_matches('/').to_owned();
        let api_root = format!("{root}/api");

        let mut builder = ClientBuilder::new()
            .min_tls_version(Version::TLS_1_2)
            .danger_accept_invalid_certs(!config.verify_tls);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        let http = builder.build()?;

        let credentials = (config.username.is_some() || config.password.is_some())
            .then(|| (config.username.clone().unwrap_or_default(), config.password.clone()));

        Ok(Self { root, api_root, credentials, http })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{api_root}{path}", api_root = self.api_root);
        tracing::debug!(%method, %url, "sandbox request");

        let request = self.http.request(method, url);
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, password.as_ref()),
            None => request,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Sends the request and unwraps the `data` member of the JSON envelope.
    fn data(&self, request: RequestBuilder) -> Result<Value> {
        let response = ensure_success(request.send()?)?;
        let envelope: Envelope = serde_json::from_slice(&response.bytes()?)?;
        envelope.into_data()
    }

    /// Sends the request and hands back the raw body. A JSON body is still checked for an error envelope.
    fn raw(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = ensure_success(request.send()?)?;
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().starts_with(APPLICATION_JSON));
        let body = response.bytes()?.to_vec();

        if is_json {
            serde_json::from_slice::<Envelope>(&body)?.into_data()?;
        }

        Ok(body)
    }

    fn buffer(&self, request: RequestBuilder) -> Result<Cursor<Vec<u8>>> {
        self.raw(request).map(Cursor::new)
    }

    fn created(&self, request: RequestBuilder) -> Result<Vec<TaskId>> {
        let created: CreatedTasks = decode(self.data(request)?)?;
        tracing::info!(tasks = ?created.task_ids, "sandbox created tasks");
        Ok(created.task_ids)
    }

    pub fn submit_file(&self, name: &str, bytes: Vec<u8>, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        let form = Form::new()
            .text("tags", tags.unwrap_or_default().to_owned())
            .text("options", options.unwrap_or_default().to_owned())
            .part("file", Part::bytes(bytes).file_name(name.to_owned()));

        self.created(self.post("/tasks/create/file/").multipart(form))
    }

    pub fn submit_url(&self, url: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        let options = memory_dump_options(options);
        let form = [("url", url), ("tags", tags.unwrap_or_default()), ("options", options.as_str())];

        self.created(self.post("/tasks/create/url/").form(&form))
    }

    /// Lets the sandbox download the sample itself from its third-party feed.
    pub fn submit_hash_lookup(&self, hash: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        let options = memory_dump_options(options);
        let form = [("vtdl", hash), ("tags", tags.unwrap_or_default()), ("options", options.as_str())];

        self.created(self.post("/tasks/create/vtdl/").form(&form))
    }

    pub fn find_tasks_by_hash(&self, hash: &str) -> Result<Vec<TaskId>> {
        let algorithm = classify(hash)?;
        let data = self.data(self.get(&format!("/tasks/search/{algorithm}/{hash}")))?;
        let records: Option<Vec<TaskRecord>> = decode(data)?;

        Ok(records.unwrap_or_default().into_iter().map(|record| record.id).collect())
    }

    pub fn extended_search(&self, fields: &HashMap<String, String>) -> Result<Value> {
        self.data(self.post("/tasks/extendedsearch/").form(fields))
    }

    pub fn list_tasks(&self, limit: Option<u32>, offset: Option<u32>, window: Option<u32>) -> Result<Value> {
        let mut path = "/tasks/list/".to_owned();
        if let Some(limit) = limit {
            path += &format!("{limit}/");
            if let Some(offset) = offset {
                path += &format!("{offset}/");
                if let Some(window) = window {
                    path += &format!("{window}/");
                }
            }
        }

        self.data(self.get(&path))
    }

    pub fn view_task(&self, task_id: &TaskId) -> Result<Value> {
        self.data(self.get(&format!("/tasks/view/{task_id}")))
    }

    pub fn reschedule_task(&self, task_id: &TaskId) -> Result<Value> {
        self.data(self.get(&format!("/tasks/reschedule/{task_id}/")))
    }

    pub fn delete_task(&self, task_id: &TaskId) -> Result<Value> {
        self.data(self.get(&format!("/tasks/delete/{task_id}")))
    }

    pub fn get_task_status(&self, task_id: &TaskId) -> Result<TaskState> {
        let raw: String = decode(self.data(self.get(&format!("/tasks/status/{task_id}")))?)?;
        let state = TaskState::from_wire(&raw);
        tracing::debug!(%task_id, wire = %raw, %state, "task status");

        Ok(state)
    }

    pub fn get_task_report(&self, task_id: &TaskId, format: &ReportFormat) -> Result<Report> {
        let request = self.get(&format!("/tasks/get/report/{task_id}/{format}"));

        Ok(match format {
            ReportFormat::Json => Report::Json(self.data(request)?),
            ReportFormat::Pdf => Report::Pdf(self.buffer(request)?),
            ReportFormat::Other(_) => Report::Raw(self.raw(request)?),
        })
    }

    pub fn get_task_iocs(&self, task_id: &TaskId, detailed: bool) -> Result<Value> {
        let mut path = format!("/tasks/get/iocs/{task_id}");
        if detailed {
            path += "/detailed/";
        }

        self.data(self.get(&path))
    }

    pub fn get_task_screenshots(&self, task_id: &TaskId, screenshot: Option<u32>) -> Result<Cursor<Vec<u8>>> {
        let mut path = format!("/tasks/get/screenshot/{task_id}/");
        if let Some(screenshot) = screenshot {
            path += &format!("{screenshot}/");
        }

        self.buffer(self.get(&path))
    }

    pub fn get_task_procmemory(&self, task_id: &TaskId, pid: Option<u32>) -> Result<Cursor<Vec<u8>>> {
        let mut path = format!("/tasks/get/procmemory/{task_id}/");
        if let Some(pid) = pid {
            path += &format!("{pid}/");
        }

        self.buffer(self.get(&path))
    }

    pub fn get_task_fullmemory(&self, task_id: &TaskId) -> Result<Cursor<Vec<u8>>> {
        self.buffer(self.get(&format!("/tasks/get/fullmemory/{task_id}/")))
    }

    pub fn get_task_pcap(&self, task_id: &TaskId) -> Result<Cursor<Vec<u8>>> {
        self.buffer(self.get(&format!("/tasks/get/pcap/{task_id}/")))
    }

    pub fn get_task_dropped_files(&self, task_id: &TaskId) -> Result<Cursor<Vec<u8>>> {
        self.buffer(self.get(&format!("/tasks/get/dropped/{task_id}/")))
    }

    pub fn get_task_suricata_files(&self, task_id: &TaskId) -> Result<Cursor<Vec<u8>>> {
        self.buffer(self.get(&format!("/tasks/get/surifile/{task_id}/")))
    }

    pub fn view_file(&self, hash: &str) -> Result<Value> {
        let algorithm = classify(hash)?;
        self.data(self.get(&format!("/files/view/{algorithm}/{hash}/")))
    }

    pub fn get_file(&self, hash: &str) -> Result<Cursor<Vec<u8>>> {
        let algorithm = classify(hash)?;
        self.buffer(self.get(&format!("/files/get/{algorithm}/{hash}/")))
    }

    pub fn list_machines(&self) -> Result<Value> {
        self.data(self.get("/machines/list/"))
    }

    pub fn view_machine(&self, name: &str) -> Result<Value> {
        self.data(self.get(&format!("/machines/view/{name}/")))
    }

    pub fn get_cuckoo_status(&self) -> Result<Value> {
        self.data(self.get("/cuckoo/status/"))
    }
}

impl SandboxApi for CuckooClient {
    fn root(&self) -> &str {
        &self.root
    }

    fn find_tasks_by_hash(&self, hash: &str) -> Result<Vec<TaskId>> {
        Self::find_tasks_by_hash(self, hash)
    }

    fn submit_file(&self, name: &str, bytes: Vec<u8>, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        Self::submit_file(self, name, bytes, tags, options)
    }

    fn submit_url(&self, url: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        Self::submit_url(self, url, tags, options)
    }

    fn submit_hash_lookup(&self, hash: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        Self::submit_hash_lookup(self, hash, tags, options)
    }

    fn get_task_status(&self, task_id: &TaskId) -> Result<TaskState> {
        Self::get_task_status(self, task_id)
    }
}
