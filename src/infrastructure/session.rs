// Session management - the authenticated-identity provider

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::core::strong_types::{DocId, SessionToken};
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user bound to `session`, or `Unauthorized`
    async fn current_user(&self, session: &SessionToken) -> AppResult<DocId>;

    /// Fails when `session` names a live session
    async fn require_logged_out(&self, session: Option<&SessionToken>) -> AppResult<()>;

    async fn start_session(&self, user: DocId) -> AppResult<SessionToken>;

    async fn end_session(&self, session: &SessionToken) -> AppResult<()>;

    /// Drop every session of `user`; returns how many were dropped
    async fn end_all_sessions(&self, user: DocId) -> AppResult<usize>;
}

/// Process-local session table
#[derive(Default)]
pub struct InMemorySessions {
    sessions: RwLock<HashMap<SessionToken, DocId>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl IdentityProvider for InMemorySessions {
    async fn current_user(&self, session: &SessionToken) -> AppResult<DocId> {
        self.sessions
            .read()
            .await
            .get(session)
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Must be logged in!".to_string()))
    }

    async fn require_logged_out(&self, session: Option<&SessionToken>) -> AppResult<()> {
        if let Some(token) = session {
            if self.sessions.read().await.contains_key(token) {
                return Err(AppError::Unauthorized("Must be logged out!".to_string()));
            }
        }
        Ok(())
    }

    async fn start_session(&self, user: DocId) -> AppResult<SessionToken> {
        let token = SessionToken::generate();
        self.sessions.write().await.insert(token.clone(), user);
        info!("Started session for user {}", user);
        Ok(token)
    }

    async fn end_session(&self, session: &SessionToken) -> AppResult<()> {
        match self.sessions.write().await.remove(session) {
            Some(user) => {
                info!("Ended session for user {}", user);
                Ok(())
            }
            None => Err(AppError::Unauthorized("Must be logged in!".to_string())),
        }
    }

    async fn end_all_sessions(&self, user: DocId) -> AppResult<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, owner| *owner != user);
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let sessions = InMemorySessions::new();
        let token = sessions.start_session(DocId(1)).await.unwrap();

        assert_eq!(sessions.current_user(&token).await.unwrap(), DocId(1));
        assert!(sessions.require_logged_out(Some(&token)).await.is_err());
        assert!(sessions.require_logged_out(None).await.is_ok());

        sessions.end_session(&token).await.unwrap();
        assert!(matches!(
            sessions.current_user(&token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(sessions.end_session(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_end_all_sessions() {
        let sessions = InMemorySessions::new();
        sessions.start_session(DocId(1)).await.unwrap();
        sessions.start_session(DocId(1)).await.unwrap();
        let other = sessions.start_session(DocId(2)).await.unwrap();

        assert_eq!(sessions.end_all_sessions(DocId(1)).await.unwrap(), 2);
        assert_eq!(sessions.active_sessions().await, 1);
        assert_eq!(sessions.current_user(&other).await.unwrap(), DocId(2));
    }
}
