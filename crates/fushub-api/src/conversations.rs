use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use fushub_types::api::{
    ConversationDetail, ConversationListResponse, MarkReadResponse, SendMessageRequest,
    StartConversationRequest, UnreadResponse,
};
use fushub_types::events::ChangeEvent;
use fushub_types::models::{Conversation, Message};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::profiles::blank_to_none;
use crate::{AppState, db_call, mapping};

const MAX_MESSAGE_CHARS: usize = 4000;
const RECENT_UNREAD_LIMIT: u32 = 10;

/// GET /conversations: the caller's inbox, most recent activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let rows = db_call(&state, move |db| db.conversation_summaries(&uid)).await?;

    let conversations: Vec<_> = rows.into_iter().map(mapping::summary).collect();
    let total_unread = conversations.iter().map(|c| c.unread_count).sum();

    Ok(Json(ConversationListResponse {
        conversations,
        total_unread,
    }))
}

/// GET /conversations/{id}. Opens a conversation: marks the counterpart's
/// messages read, then returns the header and full history.
pub async fn select_conversation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let conversation = load_as_participant(&state, &session, conversation_id).await?;
    let marked_read = mark_read_and_publish(&state, &session, &conversation).await?;

    let (cid, uid) = (conversation_id.to_string(), session.user_id.to_string());
    let (summary, messages) = db_call(&state, move |db| {
        Ok((db.conversation_summary(&cid, &uid)?, db.messages_for_conversation(&cid)?))
    })
    .await?;
    let summary = summary.ok_or(ApiError::NotFound("conversation"))?;

    Ok(Json(ConversationDetail {
        summary: mapping::summary(summary),
        messages: messages.into_iter().map(mapping::message).collect(),
        marked_read,
    }))
}

/// POST /conversations/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let conversation = load_as_participant(&state, &session, conversation_id).await?;
    let marked_read = mark_read_and_publish(&state, &session, &conversation).await?;

    Ok(Json(MarkReadResponse {
        conversation_id,
        marked_read,
    }))
}

/// POST /conversations/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let body = validate_body(&req.body)?;
    let conversation = load_as_participant(&state, &session, conversation_id).await?;

    let message_id = Uuid::new_v4();
    let (mid, cid, uid) = (
        message_id.to_string(),
        conversation_id.to_string(),
        session.user_id.to_string(),
    );
    let row = db_call(&state, move |db| db.send_message(&mid, &cid, &uid, &body)).await?;
    let message = mapping::message(row);

    debug!("{} sent message {} in {}", session.user_id, message_id, conversation_id);
    publish_message(&state, &conversation, &message);
    publish_summaries(&state, &conversation).await?;
    if let Some(recipient) = conversation.counterpart_of(session.user_id) {
        if !state.dispatcher.is_connected(recipient).await {
            debug!("{} is offline, message {} waits in their unread count", recipient, message_id);
        }
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /conversations. Contact a listing's owner. Returns the existing
/// conversation for (listing, caller) if there is one.
pub async fn start_conversation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<StartConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    let first_message = match blank_to_none(req.message) {
        Some(body) => Some(validate_body(&body)?),
        None => None,
    };

    let lid = req.listing_id.to_string();
    let listing = db_call(&state, move |db| db.get_listing(&lid))
        .await?
        .ok_or(ApiError::NotFound("listing"))?;
    let listing = mapping::listing(listing);
    if listing.owner_id == session.user_id {
        return Err(ApiError::validation("you cannot start a conversation about your own listing"));
    }

    let message_id = Uuid::new_v4().to_string();
    let (cid, lid, tenant, owner) = (
        Uuid::new_v4().to_string(),
        listing.id.to_string(),
        session.user_id.to_string(),
        listing.owner_id.to_string(),
    );
    let (row, created, message) = db_call(&state, move |db| {
        let first = first_message.as_deref().map(|body| (message_id.as_str(), body));
        db.get_or_create_conversation(&cid, &lid, &tenant, &owner, first)
    })
    .await?;
    let conversation = mapping::conversation(row);

    if created {
        info!(
            "{} opened conversation {} about listing {}",
            session.user_id, conversation.id, listing.id
        );
    }
    if let Some(row) = message {
        publish_message(&state, &conversation, &mapping::message(row));
    }
    publish_summaries(&state, &conversation).await?;

    let (cid, uid) = (conversation.id.to_string(), session.user_id.to_string());
    let summary = db_call(&state, move |db| db.conversation_summary(&cid, &uid))
        .await?
        .ok_or(ApiError::NotFound("conversation"))?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(mapping::summary(summary))))
}

/// GET /messages/unread: total unread plus the most recent few.
pub async fn unread_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let uid = session.user_id.to_string();
    let (total, rows) =
        db_call(&state, move |db| db.unread_notifications(&uid, RECENT_UNREAD_LIMIT)).await?;

    Ok(Json(UnreadResponse {
        total: u32::try_from(total).unwrap_or(u32::MAX),
        recent: rows.into_iter().map(mapping::unread).collect(),
    }))
}

/// Trimmed, non-empty, at most 4000 characters.
pub fn validate_body(raw: &str) -> ApiResult<String> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(ApiError::validation("message cannot be empty"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::validation("message is longer than 4000 characters"));
    }
    Ok(body.to_string())
}

/// Non-participants get 404 so conversation ids are not confirmed to outsiders.
async fn load_as_participant(
    state: &AppState,
    session: &Session,
    conversation_id: Uuid,
) -> ApiResult<Conversation> {
    let cid = conversation_id.to_string();
    let conversation = db_call(state, move |db| db.get_conversation(&cid))
        .await?
        .map(mapping::conversation)
        .filter(|c| c.is_participant(session.user_id))
        .ok_or(ApiError::NotFound("conversation"))?;
    Ok(conversation)
}

async fn mark_read_and_publish(
    state: &AppState,
    session: &Session,
    conversation: &Conversation,
) -> ApiResult<u32> {
    let (cid, uid) = (conversation.id.to_string(), session.user_id.to_string());
    let changed = db_call(state, move |db| db.mark_read(&cid, &uid)).await?;
    let count = u32::try_from(changed).unwrap_or(u32::MAX);

    if count > 0 {
        state.dispatcher.broadcast(ChangeEvent::MessagesRead {
            conversation_id: conversation.id,
            reader_id: session.user_id,
            count,
            tenant_id: conversation.tenant_id,
            owner_id: conversation.owner_id,
        });
        publish_summary_to(state, conversation.id, session.user_id).await?;
    }
    Ok(count)
}

fn publish_message(state: &AppState, conversation: &Conversation, message: &Message) {
    state.dispatcher.broadcast(ChangeEvent::MessageInserted {
        message: message.clone(),
        tenant_id: conversation.tenant_id,
        owner_id: conversation.owner_id,
    });
}

/// Push each participant a fresh summary so their inbox patches one entry.
async fn publish_summaries(state: &AppState, conversation: &Conversation) -> ApiResult<()> {
    for user_id in [conversation.tenant_id, conversation.owner_id] {
        publish_summary_to(state, conversation.id, user_id).await?;
    }
    Ok(())
}

async fn publish_summary_to(state: &AppState, conversation_id: Uuid, user_id: Uuid) -> ApiResult<()> {
    let (cid, uid) = (conversation_id.to_string(), user_id.to_string());
    if let Some(row) = db_call(state, move |db| db.conversation_summary(&cid, &uid)).await? {
        state
            .dispatcher
            .send_to_user(
                user_id,
                ChangeEvent::ConversationUpdated {
                    summary: mapping::summary(row),
                },
            )
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_are_trimmed() {
        assert_eq!(validate_body("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn blank_and_oversized_bodies_are_rejected() {
        assert!(validate_body("").is_err());
        assert!(validate_body(" \t\n ").is_err());
        assert!(validate_body(&"a".repeat(4001)).is_err());
        assert!(validate_body(&"é".repeat(4000)).is_ok());
    }
}
