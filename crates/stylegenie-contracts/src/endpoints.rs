use indexmap::IndexSet;

/// Ordered candidate endpoint URLs. Entries are trimmed; blanks and
/// duplicates are dropped, keeping the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointList {
    urls: IndexSet<String>,
}

impl EndpointList {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|url| url.as_ref().trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        Self { urls }
    }

    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.urls.iter().cloned().collect()
    }
}

/// Decides the order candidates are tried in and learns from successes.
pub trait EndpointStrategy {
    fn trial_order(&self, candidates: &EndpointList) -> Vec<String>;
    fn record_success(&mut self, url: &str);
    fn known_working(&self) -> Option<&str>;
}

/// Tries the last endpoint that answered with a usable payload first, then
/// the rest in configured order. Lives for one session only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownWorkingFirst {
    known_working: Option<String>,
}

impl KnownWorkingFirst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forget(&mut self) {
        self.known_working = None;
    }
}

impl EndpointStrategy for KnownWorkingFirst {
    fn trial_order(&self, candidates: &EndpointList) -> Vec<String> {
        let promoted = self
            .known_working
            .as_deref()
            .filter(|url| candidates.contains(url));
        let mut order = Vec::with_capacity(candidates.len());
        if let Some(url) = promoted {
            order.push(url.to_string());
        }
        order.extend(
            candidates
                .iter()
                .filter(|url| Some(*url) != promoted)
                .map(str::to_string),
        );
        order
    }

    fn record_success(&mut self, url: &str) {
        self.known_working = Some(url.to_string());
    }

    fn known_working(&self) -> Option<&str> {
        self.known_working.as_deref()
    }
}
