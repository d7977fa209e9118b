//! Slack identifier syntax.
//!
//! Command arguments arrive the way Slack's client escapes them:
//! `<@U123|name>` for users, `<#C123|name>` for channels,
//! `<!subteam^S123|@group>` for user groups and `<mailto:a@b.c|a@b.c>` for
//! emails. Bare ids are accepted as well.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::commands::{ParamKind, ParamSpec};

static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<@([UW][A-Z0-9]+)(?:\|[^>]+)?>$").expect("Invalid user mention regex")
});
static USER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[UW][A-Z0-9]+$").expect("Invalid user id regex"));
static CHANNEL_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<#([CG][A-Z0-9]+)(?:\|[^>]+)?>$").expect("Invalid channel mention regex")
});
static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[CG][A-Z0-9]+$").expect("Invalid channel id regex"));
static SUBTEAM_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<!subteam\^(S[A-Z0-9]+)(?:\|[^>]+)?>$").expect("Invalid subteam regex")
});
static SUBTEAM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^S[A-Z0-9]+$").expect("Invalid subteam id regex"));
static MAILTO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^<mailto:([^|>]+)(?:\|[^>]+)?>$").expect("Invalid mailto regex")
});
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex"));

fn mention_or_id(token: &str, mention: &Regex, id: &Regex) -> Option<String> {
    if let Some(caps) = mention.captures(token) {
        return Some(caps[1].to_string());
    }
    id.is_match(token).then(|| token.to_string())
}

/// User id from `<@U123|name>`, `<@U123>` or a bare `U`/`W` id.
pub fn normalize_user(token: &str) -> Option<String> {
    mention_or_id(token, &USER_MENTION, &USER_ID)
}

/// Channel id from `<#C123|name>`, `<#C123>` or a bare `C`/`G` id.
pub fn normalize_channel(token: &str) -> Option<String> {
    mention_or_id(token, &CHANNEL_MENTION, &CHANNEL_ID)
}

/// User group id from `<!subteam^S123|@group>` or a bare `S` id.
pub fn normalize_subteam(token: &str) -> Option<String> {
    mention_or_id(token, &SUBTEAM_MENTION, &SUBTEAM_ID)
}

/// Email address from `<mailto:a@b.c|a@b.c>` or `<mailto:a@b.c>`.
pub fn extract_mailto(token: &str) -> Option<String> {
    MAILTO
        .captures(token)
        .map(|caps| caps[1].trim().to_string())
}

/// Loose email check, not validation.
pub fn looks_like_email(token: &str) -> bool {
    EMAIL.is_match(token)
}

fn is_channel_like(token: &str) -> bool {
    token.starts_with('#') || normalize_channel(token).is_some()
}

fn is_user_like(token: &str) -> bool {
    normalize_user(token).is_some() || extract_mailto(token).is_some() || looks_like_email(token)
}

/// Assign tokens to parameters by shape, greedily in token order.
///
/// A token goes to the first free parameter of the kind it looks like
/// (channel, then user or email, then user group), then to a choice
/// parameter listing it, then to the first free parameter. Assignment stops
/// once every parameter is taken. The result is aligned with `params`.
pub fn assign_tokens(tokens: &[String], params: &[ParamSpec]) -> Vec<Option<String>> {
    let mut assigned: Vec<Option<String>> = vec![None; params.len()];
    let mut free: Vec<usize> = (0..params.len()).collect();

    for token in tokens {
        if free.is_empty() {
            break;
        }

        let first_free_of = |wanted: fn(&ParamKind) -> bool| {
            free.iter().copied().find(|&i| wanted(&params[i].kind))
        };

        let mut chosen = None;
        if is_channel_like(token) {
            chosen = first_free_of(|kind| matches!(kind, ParamKind::Channel));
        }
        if chosen.is_none() && is_user_like(token) {
            chosen = first_free_of(|kind| matches!(kind, ParamKind::User));
        }
        if chosen.is_none() && normalize_subteam(token).is_some() {
            chosen = first_free_of(|kind| matches!(kind, ParamKind::Subteam));
        }
        if chosen.is_none() {
            chosen = free
                .iter()
                .copied()
                .find(|&i| params[i].kind.matches_choice(token).is_some());
        }
        let Some(index) = chosen.or_else(|| free.first().copied()) else {
            break;
        };

        debug!(token = %token, param = params[index].name, "Assigned token");
        assigned[index] = Some(token.clone());
        free.retain(|&i| i != index);
    }

    assigned
}
