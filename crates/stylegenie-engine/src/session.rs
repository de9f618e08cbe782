use stylegenie_contracts::endpoints::{EndpointList, EndpointStrategy, KnownWorkingFirst};
use stylegenie_contracts::outfits::ParsedOutfits;
use stylegenie_contracts::preferences::StylePreferences;
use stylegenie_contracts::validation::ValidationError;

use crate::photo::PhotoAttachment;
use crate::transport::StylingTransport;
use crate::trial::{AggregateFailure, EndpointTrialClient, TrialError};

pub const NO_ENDPOINTS_MESSAGE: &str =
    "No styling service is configured yet. Add endpoints and try again.";

/// What the result area shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultView {
    #[default]
    Empty,
    Suggestions {
        endpoint: String,
        outfits: ParsedOutfits,
    },
    Failed {
        message: &'static str,
        diagnostic: String,
    },
}

impl ResultView {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResultView::Failed { .. })
    }
}

/// Form state for one user session plus the known-working endpoint that
/// later submissions start from.
#[derive(Debug, Clone, Default)]
pub struct StylingSession {
    preferences: StylePreferences,
    strategy: KnownWorkingFirst,
    photo: Option<PhotoAttachment>,
    view: ResultView,
    last_submitted: Option<StylePreferences>,
}

impl StylingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preferences(&self) -> &StylePreferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut StylePreferences {
        &mut self.preferences
    }

    pub fn known_working(&self) -> Option<&str> {
        self.strategy.known_working()
    }

    pub fn view(&self) -> &ResultView {
        &self.view
    }

    pub fn photo(&self) -> Option<&PhotoAttachment> {
        self.photo.as_ref()
    }

    pub fn attach_photo(&mut self, attachment: PhotoAttachment) {
        self.preferences.photo_reference = Some(attachment.reference().to_string());
        self.photo = Some(attachment);
    }

    pub fn clear_photo(&mut self) {
        self.preferences.photo_reference = None;
        self.photo = None;
    }

    /// Runs one trial pass with the current form. Validation problems come
    /// back as `Err` and leave the result area untouched; every other
    /// outcome replaces it.
    pub fn submit<T: StylingTransport>(
        &mut self,
        client: &EndpointTrialClient<T>,
        candidates: &EndpointList,
    ) -> Result<&ResultView, ValidationError> {
        let preferences = self.preferences.clone();
        self.run(client, candidates, preferences)
    }

    /// Re-runs the last submission, starting from the current known-working
    /// endpoint. Falls back to the current form when nothing was submitted.
    pub fn retry<T: StylingTransport>(
        &mut self,
        client: &EndpointTrialClient<T>,
        candidates: &EndpointList,
    ) -> Result<&ResultView, ValidationError> {
        let preferences = self
            .last_submitted
            .clone()
            .unwrap_or_else(|| self.preferences.clone());
        self.run(client, candidates, preferences)
    }

    fn run<T: StylingTransport>(
        &mut self,
        client: &EndpointTrialClient<T>,
        candidates: &EndpointList,
        preferences: StylePreferences,
    ) -> Result<&ResultView, ValidationError> {
        preferences.validate()?;
        self.view = ResultView::Empty;
        self.view = match client.run(&mut self.strategy, candidates, &preferences) {
            Ok(success) => ResultView::Suggestions {
                endpoint: success.endpoint,
                outfits: success.outfits,
            },
            Err(TrialError::Invalid(err)) => return Err(err),
            Err(TrialError::NoCandidates) => ResultView::Failed {
                message: NO_ENDPOINTS_MESSAGE,
                diagnostic: TrialError::NoCandidates.to_string(),
            },
            Err(TrialError::Exhausted(aggregate)) => failed_view(&aggregate),
        };
        self.last_submitted = Some(preferences);
        Ok(&self.view)
    }
}

fn failed_view(aggregate: &AggregateFailure) -> ResultView {
    ResultView::Failed {
        message: aggregate.user_message(),
        diagnostic: aggregate.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use stylegenie_contracts::endpoints::EndpointList;
    use stylegenie_contracts::preferences::PreferenceField;

    use super::{ResultView, StylingSession, NO_ENDPOINTS_MESSAGE};
    use crate::photo::PhotoAttachment;
    use crate::trial::tests::{ScriptedTransport, VALID_LIST};
    use crate::trial::{EndpointTrialClient, AGGREGATE_FAILURE_MESSAGE};

    fn filled_session() -> StylingSession {
        let mut session = StylingSession::new();
        let prefs = session.preferences_mut();
        prefs.set_field(PreferenceField::Occasion, "wedding").unwrap();
        prefs.set_field(PreferenceField::BodyType, "hourglass").unwrap();
        prefs.set_field(PreferenceField::Gender, "female").unwrap();
        session
    }

    #[test]
    fn missing_fields_block_submission() {
        let client = EndpointTrialClient::new(ScriptedTransport::default());
        let mut session = StylingSession::new();
        let err = session
            .submit(&client, &EndpointList::new(["https://a/x"]))
            .unwrap_err();
        assert_eq!(err.fields.len(), 2);
        assert_eq!(session.view(), &ResultView::Empty);
        assert!(client.transport().called_urls().is_empty());
    }

    #[test]
    fn failure_then_retry_uses_updated_endpoints() {
        let transport = ScriptedTransport::default()
            .reply("https://a/x", 500, "")
            .reply("https://b/x", 200, VALID_LIST);
        let client = EndpointTrialClient::new(transport);
        let mut session = filled_session();

        let view = session
            .submit(&client, &EndpointList::new(["https://a/x"]))
            .unwrap();
        let ResultView::Failed { message, .. } = view else {
            panic!("expected failure view");
        };
        assert_eq!(*message, AGGREGATE_FAILURE_MESSAGE);
        assert!(session.view().is_retryable());

        session.preferences_mut().occasion.clear();
        let view = session
            .retry(&client, &EndpointList::new(["https://a/x", "https://b/x"]))
            .unwrap()
            .clone();
        assert!(matches!(view, ResultView::Suggestions { ref endpoint, .. } if endpoint == "https://b/x"));
        assert_eq!(session.known_working(), Some("https://b/x"));
    }

    #[test]
    fn no_endpoints_shows_configuration_message() {
        let client = EndpointTrialClient::new(ScriptedTransport::default());
        let mut session = filled_session();
        let view = session.submit(&client, &EndpointList::default()).unwrap();
        assert!(matches!(
            view,
            ResultView::Failed {
                message: NO_ENDPOINTS_MESSAGE,
                ..
            }
        ));
    }

    #[test]
    fn photo_reference_follows_attachment() {
        let transport = ScriptedTransport::default().reply("https://a/x", 200, VALID_LIST);
        let client = EndpointTrialClient::new(transport);
        let mut session = filled_session();
        session.attach_photo(PhotoAttachment {
            file_name: "me.png".to_string(),
            preview_data_url: "data:image/png;base64,AAAA".to_string(),
            remote_url: Some("https://store.test/k.png".to_string()),
            warning: None,
        });
        session
            .submit(&client, &EndpointList::new(["https://a/x"]))
            .unwrap();
        {
            let calls = client.transport().calls.lock().unwrap();
            assert_eq!(calls[0].1["photo"], "https://store.test/k.png");
        }

        session.clear_photo();
        assert_eq!(session.preferences().photo_reference, None);
        assert!(session.photo().is_none());
    }
}
