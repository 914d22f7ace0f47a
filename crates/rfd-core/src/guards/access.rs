use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;

use super::{BoxHandler, Handler};
use crate::{domain::Inbound, domain::UserId, Result};

/// Static admin/subscriber sets, loaded once at startup.
///
/// Membership trusts the transport's authenticated sender id.
#[derive(Clone, Debug, Default)]
pub struct AccessList {
    admins: HashSet<UserId>,
    subscribers: HashSet<UserId>,
}

impl AccessList {
    pub fn new(admins: HashSet<UserId>, subscribers: HashSet<UserId>) -> Self {
        Self {
            admins,
            subscribers,
        }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    pub fn is_subscriber(&self, user: UserId) -> bool {
        self.subscribers.contains(&user)
    }

    pub fn has(&self, role: Role, user: UserId) -> bool {
        match role {
            Role::Admin => self.is_admin(user),
            Role::Subscriber => self.is_subscriber(user),
        }
    }

    pub fn admins(&self) -> impl Iterator<Item = UserId> + '_ {
        self.admins.iter().copied()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = UserId> + '_ {
        self.subscribers.iter().copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Subscriber,
}

/// Runs the inner handler only for senders holding `role`; otherwise does nothing.
pub struct RequireRole<E> {
    role: Role,
    access: Arc<AccessList>,
    inner: BoxHandler<E>,
}

impl<E> RequireRole<E> {
    pub fn new(role: Role, access: Arc<AccessList>, inner: BoxHandler<E>) -> Self {
        Self {
            role,
            access,
            inner,
        }
    }
}

#[async_trait]
impl<E: Inbound> Handler<E> for RequireRole<E> {
    async fn handle(&self, event: E) -> Result<()> {
        let user = event.sender().id;
        if !self.access.has(self.role, user) {
            tracing::debug!(user = user.0, role = ?self.role, "permission denied");
            return Ok(());
        }
        self.inner.handle(event).await
    }
}
