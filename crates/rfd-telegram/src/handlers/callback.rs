use std::sync::Arc;

use rfd_core::{
    domain::Callback,
    guards::Guarded,
    messaging::types::InlineKeyboard,
    Result,
};

use super::{
    bind,
    commands::{menu_text, MENU_REFRESH},
    Routes, Services,
};

pub(super) fn register(routes: &mut Routes, svc: &Arc<Services>) {
    // reject_stale -> menu_refresh
    routes.on_callback(
        MENU_REFRESH,
        Guarded::new("menu_refresh", bind(svc, menu_refresh)).reject_stale(
            svc.cfg.callback_ttl,
            "/menu",
            &svc.ctx,
        ),
    );
}

async fn menu_refresh(svc: Arc<Services>, cb: Callback) -> Result<()> {
    let port = svc.ctx.messenger.as_ref();
    if let Some(message) = &cb.message {
        let keyboard = InlineKeyboard::single("Refresh", MENU_REFRESH);
        port.edit_message_text(
            message.msg_ref(),
            &menu_text(svc.ctx.clock.now()),
            Some(&keyboard),
        )
        .await?;
    }
    port.answer_callback_query(&cb.id, Some("Updated")).await
}

#[cfg(test)]
mod tests {
    use rfd_core::{domain::fixtures, guards::STALE_ANSWER};

    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn refresh_edits_menu_in_place() {
        let h = harness("refresh");
        let menu = fixtures::message_at(9, "Server time: 00:16:10 UTC", 990);
        let cb = fixtures::callback(STRANGER, menu.clone(), MENU_REFRESH);
        assert!(h.routes.dispatch_callback(cb).await.unwrap());

        let edits = h.messenger.edits.lock().unwrap().clone();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, menu.msg_ref());
        assert_eq!(edits[0].1, "Server time: 00:16:40 UTC");
        assert_eq!(
            edits[0].2,
            Some(InlineKeyboard::single("Refresh", MENU_REFRESH))
        );
        let answers = h.messenger.answers.lock().unwrap().clone();
        assert_eq!(answers, vec![("cb-1".to_string(), Some("Updated".to_string()))]);
    }

    #[tokio::test]
    async fn stale_menu_is_rejected() {
        let h = harness("refresh-stale");
        let menu = fixtures::message_at(9, "Server time: 00:00:00 UTC", 0);
        let cb = fixtures::callback(STRANGER, menu, MENU_REFRESH);
        h.routes.dispatch_callback(cb).await.unwrap();

        let edits = h.messenger.edits.lock().unwrap().clone();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].1.contains("Please re-issue /menu."));
        assert_eq!(edits[0].2, None);
        let answers = h.messenger.answers.lock().unwrap().clone();
        assert_eq!(answers[0].1.as_deref(), Some(STALE_ANSWER));
        assert_eq!(h.audit_lines()[0]["event"], "stale_callback");
    }
}
