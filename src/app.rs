use crate::service::QaService;
use crate::session::Session;
use crate::utils::{ANSWER_WIDTH, normalize_input, wrap_text};

pub const KEY_WARNING: &str = "Please enter your OpenAI API key to continue.";

/// What the visitor just did.
#[derive(Debug, Clone)]
pub enum Event {
    Load,
    SetKey(String),
    Ask(String),
}

/// Everything the page needs to draw, derived fresh on every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageView {
    pub key_present: bool,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub question_enabled: bool,
    pub question: Option<String>,
    pub answer: Option<String>,
}

/// Runs one interaction against `session` and returns the resulting view.
///
/// Nothing reaches the network until the session holds a non-blank key.
/// Each failure is reported in `error` and stops the cycle at that step.
pub async fn run_cycle(service: &QaService, session: &mut Session, event: Event) -> PageView {
    if let Event::SetKey(key) = &event {
        let key = key.trim().to_string();
        if key != session.api_key {
            session.api_key = key;
            session.last_question = None;
            session.last_answer = None;
            session.last_error = None;
        }
    }

    let mut view = PageView {
        key_present: session.has_key(),
        ..PageView::default()
    };

    if !session.has_key() {
        view.warning = Some(KEY_WARNING.to_string());
        return view;
    }
    let api_key = session.api_key.clone();

    let store = match service.initialize_vector_store(&api_key).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("❌ Vector store initialization failed: {}", e);
            view.error = Some(format!("Error initializing vector store: {}", e));
            return view;
        }
    };

    let chain = match service.initialize_qa_chain(&store, &api_key).await {
        Ok(chain) => chain,
        Err(e) => {
            tracing::error!("❌ QA chain initialization failed: {}", e);
            view.error = Some(format!("Error initializing QA chain: {}", e));
            return view;
        }
    };

    view.question_enabled = true;

    if let Event::Ask(question) = event {
        let question = normalize_input(&question);
        if !question.is_empty() {
            match service.get_answer(&question, &chain).await {
                Ok(answer) => {
                    session.last_answer = if answer.answer.is_empty() {
                        None
                    } else {
                        Some(wrap_text(&answer.answer, ANSWER_WIDTH))
                    };
                    session.last_error = None;
                }
                Err(e) => {
                    tracing::error!("❌ Answering failed: {}", e);
                    session.last_error = Some(format!("Error getting answer: {}", e));
                }
            }
            session.last_question = Some(question);
        }
    }

    view.question = session.last_question.clone();
    // A pending answer error replaces the answer block; the last good answer
    // stays in the session but is not shown next to it.
    match &session.last_error {
        Some(error) => view.error = Some(error.clone()),
        None => view.answer = session.last_answer.clone(),
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalSettings;
    use crate::errors::QaError;
    use crate::service::testing::FakeConnector;
    use std::sync::Arc;

    fn service(connector: &Arc<FakeConnector>) -> QaService {
        QaService::new(connector.clone(), RetrievalSettings::default())
    }

    #[tokio::test]
    async fn test_blank_keys_warn_without_network() {
        let connector = Arc::new(FakeConnector::new(Vec::new()));
        let service = service(&connector);

        for key in ["", "   ", "\t\n"] {
            let mut session = Session::default();
            let view = run_cycle(&service, &mut session, Event::SetKey(key.to_string())).await;
            assert_eq!(view.warning.as_deref(), Some(KEY_WARNING));
            assert!(!view.question_enabled);
            assert!(view.error.is_none());
        }

        let mut session = Session::default();
        let view = run_cycle(&service, &mut session, Event::Ask("Where is Apple?".into())).await;
        assert_eq!(view.warning.as_deref(), Some(KEY_WARNING));

        assert_eq!(connector.store_calls(), 0);
        assert_eq!(connector.chat_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_hides_question_field() {
        let connector = Arc::new(FakeConnector::failing_store("index form_10k_chunks missing"));
        let service = service(&connector);
        let mut session = Session::default();

        let view = run_cycle(&service, &mut session, Event::SetKey("sk-bad".into())).await;
        let error = view.error.unwrap();
        assert!(error.starts_with("Error initializing vector store:"));
        assert!(error.contains("index form_10k_chunks missing"));
        assert!(!view.question_enabled);
        assert_eq!(connector.chat_calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_failure_shows_error_instead_of_stale_answer() {
        let connector = Arc::new(FakeConnector::new(vec![
            Ok("Los Gatos, California.\nSOURCES: nflx".to_string()),
            Err(QaError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            }),
            Ok("Primarily in Asia.\nSOURCES: tsla".to_string()),
        ]));
        let service = service(&connector);
        let mut session = Session::default();

        run_cycle(&service, &mut session, Event::SetKey("sk-good".into())).await;
        let first = run_cycle(
            &service,
            &mut session,
            Event::Ask("Where is Netflix headquartered?".into()),
        )
        .await;
        assert_eq!(first.answer.as_deref(), Some("Los Gatos, California."));
        assert!(first.error.is_none());

        let failed = run_cycle(
            &service,
            &mut session,
            Event::Ask("Where are the primary suppliers for Tesla?".into()),
        )
        .await;
        assert!(failed.answer.is_none());
        assert_eq!(
            failed.question.as_deref(),
            Some("Where are the primary suppliers for Tesla?")
        );
        let error = failed.error.clone().unwrap();
        assert!(error.starts_with("Error getting answer:"));
        assert!(error.contains("upstream exploded"));
        assert_eq!(session.last_answer.as_deref(), Some("Los Gatos, California."));

        let html = crate::page::render(&failed);
        assert!(!html.contains("Answer:"));
        assert!(!html.contains("Los Gatos"));
        assert!(html.contains(r#"value="Where are the primary suppliers for Tesla?""#));

        let reloaded = run_cycle(&service, &mut session, Event::Load).await;
        assert_eq!(reloaded.error, failed.error);
        assert!(reloaded.answer.is_none());

        let recovered = run_cycle(
            &service,
            &mut session,
            Event::Ask("Where are the primary suppliers for Tesla?".into()),
        )
        .await;
        assert!(recovered.error.is_none());
        assert_eq!(recovered.answer.as_deref(), Some("Primarily in Asia."));
    }

    #[tokio::test]
    async fn test_chain_failure_hides_question_field() {
        let connector = Arc::new(FakeConnector::failing_chat("invalid chat model settings"));
        let service = service(&connector);
        let mut session = Session::default();

        let view = run_cycle(&service, &mut session, Event::SetKey("sk-good".into())).await;
        let error = view.error.unwrap();
        assert!(error.starts_with("Error initializing QA chain:"));
        assert!(error.contains("invalid chat model settings"));
        assert!(!view.question_enabled);
        assert_eq!(connector.store_calls(), 1);
        assert_eq!(connector.chat_calls(), 1);

        let html = crate::page::render(&run_cycle(&service, &mut session, Event::Load).await);
        assert!(!html.contains(r#"name="question""#));
        assert_eq!(connector.chat_calls(), 2);
    }

    #[tokio::test]
    async fn test_handles_are_reused_across_cycles() {
        let connector = Arc::new(FakeConnector::new(Vec::new()));
        let service = service(&connector);
        let mut session = Session::default();

        run_cycle(&service, &mut session, Event::SetKey("sk-one".into())).await;
        run_cycle(&service, &mut session, Event::Load).await;
        run_cycle(&service, &mut session, Event::Load).await;
        assert_eq!(connector.store_calls(), 1);
        assert_eq!(connector.chat_calls(), 1);

        let view = run_cycle(&service, &mut session, Event::SetKey("sk-two".into())).await;
        assert!(view.question_enabled);
        assert_eq!(connector.store_calls(), 2);
        assert_eq!(connector.chat_calls(), 2);
    }

    #[tokio::test]
    async fn test_netflix_question_produces_wrapped_answer() {
        let long_answer = "Netflix's primary business is a streaming entertainment service \
            that offers a wide variety of TV series, documentaries, feature films and mobile \
            games across many genres and languages to paying members in over 190 countries.";
        let connector = Arc::new(FakeConnector::new(vec![Ok(format!(
            "{}\nSOURCES: https://www.sec.gov/nflx-0",
            long_answer
        ))]));
        let service = service(&connector);
        let mut session = Session::default();

        run_cycle(&service, &mut session, Event::SetKey("sk-good".into())).await;
        let view = run_cycle(
            &service,
            &mut session,
            Event::Ask("What is Netflix's primary business?".into()),
        )
        .await;

        assert!(view.error.is_none());
        let answer = view.answer.unwrap();
        assert!(!answer.is_empty());
        assert!(answer.lines().count() > 1);
        assert!(answer.lines().all(|line| line.chars().count() <= ANSWER_WIDTH));
    }
}
