//! # Request Options
//!
//! Caller-supplied configuration for a single request. Every field carries
//! its documented default through [`RequestOptions::default`], so the
//! preprocessor never has to merge partial option bags.
//!
//! Options serialize (closures excluded) so they can be written to the
//! diagnostic log queue as-is.

use bridge_traits::{HttpMethod, RequestMode, StatusValidator};
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::log_queue::{LogSink, SharedLogSink};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(6500);

pub const DEFAULT_COOKIE_HEADER: &str = "X-Custom-Cookie";
pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRFToken";

/// Parameter names dropped by `delete_time_field`.
pub const TIME_FIELDS: [&str; 5] = ["createTime", "creTime", "updateTime", "createDate", "updateDate"];

/// Execution environment, which decides the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReqEnv {
    /// HTTP-client transport
    Browser,
    /// React-Native `fetch`; no timeout timer
    Rn,
    /// Mini-program request primitive
    Uni,
    /// Raw `fetch`
    Fetch,
}

impl ReqEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Rn => "rn",
            Self::Uni => "uni",
            Self::Fetch => "fetch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReqType {
    #[default]
    Xhr,
    /// Server-push streaming
    Sse,
}

/// Body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Manner {
    #[default]
    Form,
    Json,
    File,
}

/// How caller-supplied cookies travel with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieMode {
    /// Credentialed request; cookies are written to the cookie store
    Credentials,
    /// Serialized into a custom header
    #[default]
    Header,
    Both,
}

impl CookieMode {
    pub fn uses_credentials(&self) -> bool {
        matches!(self, Self::Credentials | Self::Both)
    }

    pub fn uses_header(&self) -> bool {
        matches!(self, Self::Header | Self::Both)
    }
}

/// Where an uploaded file's content comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    Bytes {
        data: Bytes,
        content_type: Option<String>,
    },
    /// Local file URI (React-Native style uploads)
    Uri(String),
}

/// One file in a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    pub name: String,
    pub file_id: Option<String>,
    pub source: FileSource,
}

impl FileItem {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            file_id: None,
            source: FileSource::Bytes {
                data: data.into(),
                content_type: None,
            },
        }
    }

    pub fn from_uri(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_id: None,
            source: FileSource::Uri(uri.into()),
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn with_content_type(mut self, mime: impl Into<String>) -> Self {
        if let FileSource::Bytes { content_type, .. } = &mut self.source {
            *content_type = Some(mime.into());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileUpload {
    Single(FileItem),
    Many(Vec<FileItem>),
}

impl FileUpload {
    pub fn items(&self) -> &[FileItem] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Configuration for one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    /// Explicit environment; probed from the host capabilities when unset
    pub req_env: Option<ReqEnv>,
    pub req_type: ReqType,
    pub method: HttpMethod,
    pub manner: Manner,
    pub params: Option<Value>,
    #[serde(skip)]
    pub files: Option<FileUpload>,

    /// Drop `""` and `null` parameters
    pub is_filter: bool,
    /// Parameters kept verbatim regardless of filtering
    pub no_filter_field: Vec<String>,
    pub delete_field: Vec<String>,
    /// Also drop the names in [`TIME_FIELDS`]
    pub delete_time_field: bool,

    pub headers: HashMap<String, String>,
    /// Download mode: binary response, no business check
    pub is_file: bool,
    pub mode: RequestMode,
    /// Skip preprocessing and postprocessing entirely
    pub is_external: bool,

    pub cache_data: bool,
    pub cache_key: Option<String>,
    /// Cache TTL in milliseconds; `0` caches forever
    pub cache_control: Option<u64>,

    #[serde(serialize_with = "serialize_millis")]
    pub timeout: Duration,

    pub cache_log: bool,
    /// Queue capacity used when this request creates the diagnostic queue;
    /// `None` falls back to the client's configured length
    pub max_cache_log: Option<usize>,
    #[serde(skip)]
    pub cache_method: Option<SharedLogSink>,

    pub with_credentials: bool,
    pub cookies: BTreeMap<String, String>,
    pub cookie_mode: CookieMode,
    pub cookie_header_name: String,
    #[serde(rename = "autoCSRF")]
    pub auto_csrf: bool,
    pub csrf_cookie_name: String,
    pub csrf_header_name: String,

    /// Replacement for empty leaves in the result
    pub res_null_replace: Option<String>,
    pub res_replace_field: Vec<String>,

    /// With an error handler, resolve `{code: 0}` instead of rejecting
    pub error_continue: bool,
    pub show_log: bool,
    #[serde(skip)]
    pub validate_status: Option<StatusValidator>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            req_env: None,
            req_type: ReqType::Xhr,
            method: HttpMethod::Post,
            manner: Manner::Form,
            params: None,
            files: None,
            is_filter: true,
            no_filter_field: Vec::new(),
            delete_field: Vec::new(),
            delete_time_field: false,
            headers: HashMap::new(),
            is_file: false,
            mode: RequestMode::Cors,
            is_external: false,
            cache_data: false,
            cache_key: None,
            cache_control: None,
            timeout: DEFAULT_TIMEOUT,
            cache_log: false,
            max_cache_log: None,
            cache_method: None,
            with_credentials: false,
            cookies: BTreeMap::new(),
            cookie_mode: CookieMode::Header,
            cookie_header_name: DEFAULT_COOKIE_HEADER.to_string(),
            auto_csrf: false,
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_header_name: DEFAULT_CSRF_HEADER.to_string(),
            res_null_replace: None,
            res_replace_field: Vec::new(),
            error_continue: false,
            show_log: false,
            validate_status: Some(StatusValidator::accept_all()),
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get() -> Self {
        Self::default().with_method(HttpMethod::Get)
    }

    pub fn post() -> Self {
        Self::default()
    }

    /// Server-push streaming request.
    pub fn sse() -> Self {
        Self {
            req_type: ReqType::Sse,
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env: ReqEnv) -> Self {
        self.req_env = Some(env);
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_manner(mut self, manner: Manner) -> Self {
        self.manner = manner;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Multipart upload; switches the manner to [`Manner::File`].
    pub fn with_files(mut self, files: FileUpload) -> Self {
        self.files = Some(files);
        self.manner = Manner::File;
        self
    }

    pub fn with_filter(mut self, enabled: bool) -> Self {
        self.is_filter = enabled;
        self
    }

    pub fn with_no_filter_field<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_filter_field = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delete_field<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delete_field = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delete_time_field(mut self, enabled: bool) -> Self {
        self.delete_time_field = enabled;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Download mode.
    pub fn file_download(mut self) -> Self {
        self.is_file = true;
        self
    }

    pub fn external(mut self) -> Self {
        self.is_external = true;
        self
    }

    /// Cache successful responses for `ttl_ms` milliseconds.
    pub fn with_cache(mut self, ttl_ms: u64) -> Self {
        self.cache_data = true;
        self.cache_control = Some(ttl_ms);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_data = true;
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable diagnostic logging. `max_cache_log` only takes effect if this
    /// request is the one that creates the queue.
    pub fn with_cache_log(mut self, max_cache_log: usize) -> Self {
        self.cache_log = true;
        self.max_cache_log = Some(max_cache_log);
        self
    }

    pub fn with_cache_method(mut self, sink: impl LogSink + 'static) -> Self {
        self.cache_method = Some(SharedLogSink::new(sink));
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_cookie_mode(mut self, mode: CookieMode) -> Self {
        self.cookie_mode = mode;
        self
    }

    pub fn with_cookie_header_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_header_name = name.into();
        self
    }

    pub fn with_auto_csrf(mut self, enabled: bool) -> Self {
        self.auto_csrf = enabled;
        self
    }

    pub fn with_null_replace(mut self, replacement: impl Into<String>) -> Self {
        self.res_null_replace = Some(replacement.into());
        self
    }

    pub fn with_replace_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.res_replace_field = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_error_continue(mut self, enabled: bool) -> Self {
        self.error_continue = enabled;
        self
    }

    pub fn with_show_log(mut self, enabled: bool) -> Self {
        self.show_log = enabled;
        self
    }

    pub fn with_validate_status(mut self, validator: StatusValidator) -> Self {
        self.validate_status = Some(validator);
        self
    }

    /// JSON form written to the diagnostic log.
    pub fn to_log_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
