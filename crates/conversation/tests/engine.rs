//! End-to-end tests for the conversation engine with a scripted collaborator.

use finsight_common::config::AppConfig;
use finsight_common::errors::AppError;
use finsight_common::llm::MockLlmClient;
use finsight_common::models::{Citation, Document, DocumentStatus, MessageRole};
use finsight_common::store::{
    ConversationStore, DocumentRepository, MemoryConversationStore, MemoryDocumentRepository,
};
use finsight_conversation::ConversationEngine;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: Arc<ConversationEngine>,
    store: MemoryConversationStore,
    repo: MemoryDocumentRepository,
    llm: Arc<MockLlmClient>,
}

fn harness() -> Harness {
    let store = MemoryConversationStore::new();
    let repo = MemoryDocumentRepository::new();
    let llm = Arc::new(MockLlmClient::new());
    let engine = Arc::new(ConversationEngine::new(
        Arc::new(store.clone()),
        Arc::new(repo.clone()),
        llm.clone(),
        AppConfig::default(),
    ));
    Harness {
        engine,
        store,
        repo,
        llm,
    }
}

async fn seed_document(repo: &MemoryDocumentRepository) -> Document {
    let mut doc = Document::new("Q3 Report", "application/pdf");
    doc.status = DocumentStatus::Completed;
    doc.raw_text = Some("Net sales were $100M in the third quarter of 2023.".to_string());
    doc.citations =
        vec![Citation::synthesized_page("Q3 Report", 4, 5, "Net sales were $100M").with_id("c1")];
    repo.insert(doc.clone()).await.unwrap();
    doc
}

#[tokio::test]
async fn test_marker_resolution_end_to_end() {
    let h = harness();
    let doc = seed_document(&h.repo).await;

    let conversation = h.engine.create_conversation(Some("Q3".into())).await.unwrap();
    h.engine
        .add_documents(conversation.conversation_id, &[doc.id])
        .await
        .unwrap();

    h.llm.push_text("RESPONSE_GENERATOR");
    h.llm
        .push_text("Net sales were $100M in Q3 [Citation: c1].");
    h.llm
        .push_text("Net sales were $100M in Q3 [Citation: c1].");

    let outcome = h
        .engine
        .process_message(conversation.conversation_id, "what were net sales?", &[])
        .await
        .unwrap();

    assert!(!outcome.turn_failed);
    assert!(outcome.message.content.contains("$100M"));
    assert_eq!(outcome.message.citations_used.len(), 1);
    assert_eq!(outcome.message.citations_used[0].id.as_deref(), Some("c1"));
    assert_eq!(
        outcome.message.citations_used[0].cited_text,
        "Net sales were $100M"
    );
}

#[tokio::test]
async fn test_collaborator_timeout_yields_apology() {
    let h = harness();
    let doc = seed_document(&h.repo).await;

    let conversation = h.engine.create_conversation(None).await.unwrap();
    h.engine
        .add_documents(conversation.conversation_id, &[doc.id])
        .await
        .unwrap();

    h.llm.push_text("RESPONSE_GENERATOR");
    h.llm
        .push_error(AppError::CollaboratorTimeout { timeout_ms: 30_000 });

    let outcome = h
        .engine
        .process_message(conversation.conversation_id, "what were net sales?", &[])
        .await
        .unwrap();

    assert!(outcome.turn_failed);
    assert!(outcome.error.is_some());
    assert!(outcome.message.citations_used.is_empty());

    let state = h
        .engine
        .get_conversation(conversation.conversation_id)
        .await
        .unwrap();

    // Exactly one assistant message appended, and the active set untouched.
    let assistant_count = state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .count();
    assert_eq!(assistant_count, 1);
    assert!(state.active_document_ids.contains(&doc.id));
    assert_eq!(state.active_document_ids.len(), 1);

    // The conversation stays usable: the next turn succeeds.
    h.llm.push_text("RESPONSE_GENERATOR");
    h.llm.push_text("Net sales were $100M.");
    let next = h
        .engine
        .process_message(conversation.conversation_id, "try again?", &[])
        .await
        .unwrap();
    assert!(!next.turn_failed);
}

#[tokio::test]
async fn test_citation_polish_failure_aborts_turn() {
    let h = harness();
    let doc = seed_document(&h.repo).await;

    let conversation = h.engine.create_conversation(None).await.unwrap();
    h.engine
        .add_documents(conversation.conversation_id, &[doc.id])
        .await
        .unwrap();

    h.llm.push_text("RESPONSE_GENERATOR");
    h.llm
        .push_text("Net sales were $100M in Q3 [Citation: c1].");
    h.llm
        .push_error(AppError::CollaboratorTimeout { timeout_ms: 30_000 });

    let outcome = h
        .engine
        .process_message(conversation.conversation_id, "what were net sales?", &[])
        .await
        .unwrap();

    // A failure in the citation-processing node discards the draft like any
    // other node failure: apology, no citations, failed-turn signal.
    assert!(outcome.turn_failed);
    assert!(outcome.error.is_some());
    assert!(outcome.message.citations_used.is_empty());
    assert!(!outcome.message.content.contains("[Citation"));

    let state = h
        .engine
        .get_conversation(conversation.conversation_id)
        .await
        .unwrap();
    let assistant_count = state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .count();
    assert_eq!(assistant_count, 1);
}

#[tokio::test]
async fn test_delete_conversation() {
    let h = harness();
    let conversation = h.engine.create_conversation(None).await.unwrap();
    let id = conversation.conversation_id;

    h.engine.process_message(id, "hello", &[]).await.unwrap();

    assert!(h.engine.delete_conversation(id).await.unwrap());
    assert!(!h.engine.delete_conversation(id).await.unwrap());

    let err = h.engine.get_conversation(id).await.unwrap_err();
    assert!(matches!(err, AppError::ConversationNotFound { .. }));
    let err = h.engine.process_message(id, "still there?", &[]).await.unwrap_err();
    assert!(matches!(err, AppError::ConversationNotFound { .. }));

    assert!(!h
        .engine
        .list_conversations()
        .await
        .unwrap()
        .iter()
        .any(|c| c.conversation_id == id));
}

#[tokio::test]
async fn test_back_to_back_turns_execute_in_submission_order() {
    let h = harness();
    let conversation = h.engine.create_conversation(None).await.unwrap();
    let id = conversation.conversation_id;

    let engine1 = h.engine.clone();
    let first = tokio::spawn(async move {
        engine1.process_message(id, "first question", &[]).await
    });
    // Let the first turn take the conversation lock before dispatching the
    // second.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let engine2 = h.engine.clone();
    let second = tokio::spawn(async move {
        engine2.process_message(id, "second question", &[]).await
    });

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let state = h.store.load(id).await.unwrap().unwrap();
    let contents: Vec<&str> = state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["first question", "second question"]);

    // Each user message is directly followed by its assistant reply.
    assert_eq!(state.messages.len(), 4);
    assert_eq!(state.messages[0].role, MessageRole::User);
    assert_eq!(state.messages[1].role, MessageRole::Assistant);
    assert_eq!(state.messages[2].role, MessageRole::User);
    assert_eq!(state.messages[3].role, MessageRole::Assistant);
}

#[tokio::test]
async fn test_unrecognized_route_defaults_to_answer() {
    let h = harness();
    let conversation = h.engine.create_conversation(None).await.unwrap();

    h.llm.push_text("I think we should do something else entirely");
    h.llm.push_text("Here is a direct answer.");

    let outcome = h
        .engine
        .process_message(conversation.conversation_id, "hello", &[])
        .await
        .unwrap();

    assert!(!outcome.turn_failed);
    assert!(!outcome.message.content.is_empty());
    assert_eq!(outcome.message.content, "Here is a direct answer.");
}

#[tokio::test]
async fn test_document_processor_path_populates_digest() {
    let h = harness();
    let doc = seed_document(&h.repo).await;

    let conversation = h.engine.create_conversation(None).await.unwrap();
    h.engine
        .add_documents(conversation.conversation_id, &[doc.id])
        .await
        .unwrap();

    h.llm.push_text("DOCUMENT_PROCESSOR");
    h.llm.push_text("Relevant fact: net sales were $100M.");
    h.llm.push_text("Net sales were $100M [Citation: c1].");
    h.llm.push_text("Net sales were $100M [Citation: c1].");

    let outcome = h
        .engine
        .process_message(conversation.conversation_id, "summarize the quarter", &[])
        .await
        .unwrap();

    assert!(!outcome.turn_failed);
    assert_eq!(h.llm.call_count(), 4);

    let state = h
        .engine
        .get_conversation(conversation.conversation_id)
        .await
        .unwrap();
    assert!(state.turn_context.contains_key("document_digest"));

    // The generator's prompt carried the extracted facts.
    let requests = h.llm.requests();
    assert!(requests[2].system_prompt.contains("Relevant fact"));
}

#[tokio::test]
async fn test_turn_context_cleared_between_turns() {
    let h = harness();
    let doc = seed_document(&h.repo).await;

    let conversation = h.engine.create_conversation(None).await.unwrap();
    h.engine
        .add_documents(conversation.conversation_id, &[doc.id])
        .await
        .unwrap();

    h.llm.push_text("DOCUMENT_PROCESSOR");
    h.llm.push_text("Digest from turn one.");
    h.llm.push_text("Answer one.");
    h.engine
        .process_message(conversation.conversation_id, "first", &[])
        .await
        .unwrap();

    h.llm.push_text("RESPONSE_GENERATOR");
    h.llm.push_text("Answer two.");
    h.engine
        .process_message(conversation.conversation_id, "second", &[])
        .await
        .unwrap();

    let state = h
        .engine
        .get_conversation(conversation.conversation_id)
        .await
        .unwrap();
    assert!(!state.turn_context.contains_key("document_digest"));
    assert_eq!(
        state.turn_context.get("route").and_then(|v| v.as_str()),
        Some("response_generator")
    );
}

#[tokio::test]
async fn test_explicit_document_ids_merge_into_active_set() {
    let h = harness();
    let doc = seed_document(&h.repo).await;

    let conversation = h.engine.create_conversation(None).await.unwrap();

    h.llm.push_text("RESPONSE_GENERATOR");
    h.llm.push_text("Answer.");
    h.engine
        .process_message(conversation.conversation_id, "look at this", &[doc.id])
        .await
        .unwrap();

    let state = h
        .engine
        .get_conversation(conversation.conversation_id)
        .await
        .unwrap();
    assert!(state.active_document_ids.contains(&doc.id));
    assert_eq!(state.citations.len(), 1);
}

#[tokio::test]
async fn test_unknown_ids_rejected_before_mutation() {
    let h = harness();
    let conversation = h.engine.create_conversation(None).await.unwrap();

    let err = h
        .engine
        .process_message(
            conversation.conversation_id,
            "look at this",
            &[uuid::Uuid::new_v4()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DocumentNotFound { .. }));

    // Nothing was written: the history is still empty.
    let state = h
        .engine
        .get_conversation(conversation.conversation_id)
        .await
        .unwrap();
    assert!(state.messages.is_empty());

    let err = h
        .engine
        .process_message(uuid::Uuid::new_v4(), "hello", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConversationNotFound { .. }));
}

#[tokio::test]
async fn test_empty_content_is_a_validation_error() {
    let h = harness();
    let conversation = h.engine.create_conversation(None).await.unwrap();

    let err = h
        .engine
        .process_message(conversation.conversation_id, "   ", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_history_limit() {
    let h = harness();
    let conversation = h.engine.create_conversation(None).await.unwrap();

    for i in 0..3 {
        h.engine
            .process_message(conversation.conversation_id, &format!("question {}", i), &[])
            .await
            .unwrap();
    }

    let full = h
        .engine
        .get_history(conversation.conversation_id, None)
        .await
        .unwrap();
    assert_eq!(full.len(), 6);

    let tail = h
        .engine
        .get_history(conversation.conversation_id, Some(2))
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].content, "question 2");
    assert_eq!(tail[1].role, MessageRole::Assistant);
}
