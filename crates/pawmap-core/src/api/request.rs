use crate::models::NearbyQuery;

/// Marker collection endpoint.
pub const MARKERS_PATH: &str = "/markers";

/// Unfiltered listing endpoint.
pub const ALL_MARKERS_PATH: &str = "/markers/all";

/// Structured search endpoint (POST, JSON body).
pub const SEARCH_PATH: &str = "/markers/search";

/// One concrete shape of "list markers" request.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerRequest {
    /// `GET {path}?{params}`
    Get {
        path: &'static str,
        params: Vec<(&'static str, String)>,
    },
    /// `POST /markers/search` with the query as JSON body.
    Search(NearbyQuery),
}

impl MarkerRequest {
    pub fn get(path: &'static str) -> Self {
        MarkerRequest::Get {
            path,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        if let MarkerRequest::Get { params, .. } = &mut self {
            params.push((key, value.to_string()));
        }
        self
    }

    pub fn path(&self) -> &'static str {
        match self {
            MarkerRequest::Get { path, .. } => path,
            MarkerRequest::Search(_) => SEARCH_PATH,
        }
    }

    /// Value of a query parameter, if set.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        match self {
            MarkerRequest::Get { params, .. } => params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str()),
            MarkerRequest::Search(_) => None,
        }
    }
}

impl std::fmt::Display for MarkerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerRequest::Get { path, params } if params.is_empty() => write!(f, "GET {}", path),
            MarkerRequest::Get { path, params } => {
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "GET {}?{}", path, query.join("&"))
            }
            MarkerRequest::Search(_) => write!(f, "POST {}", SEARCH_PATH),
        }
    }
}
