//! 令牌服务集成测试
//!
//! 覆盖从配置构造、签发、验证到失败路径的完整流程

mod common;

use common::create_test_config;
use speech_history_service::auth::token::{TokenError, TokenService};
use uuid::Uuid;

fn fixed_user_id() -> Uuid {
    Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
}

#[test]
fn test_token_service_from_config() {
    let config = create_test_config();
    let service = TokenService::from_config(&config);

    // 32 字节测试密钥按原样使用
    assert_eq!(service.key_len(), 32);
}

#[test]
fn test_end_to_end_issue_and_verify() {
    let config = create_test_config();
    let service = TokenService::from_config(&config);
    let user_id = fixed_user_id();

    let token = service.issue(&user_id, "a@b.com").expect("issue should succeed");

    // JWT 应为三段式
    assert_eq!(token.split('.').count(), 3);

    let identity = service.verify(&token).expect("verify should succeed");
    assert_eq!(identity.user_id, user_id);
    assert_eq!(identity.email, "a@b.com");

    assert_eq!(service.user_id_from_token(&token).unwrap(), user_id);
}

#[test]
fn test_tokens_are_unique_per_issue() {
    let config = create_test_config();
    let service = TokenService::from_config(&config);
    let user_id = fixed_user_id();

    // 随机 nonce 使同一身份的两个令牌不同
    let token1 = service.issue(&user_id, "a@b.com").unwrap();
    let token2 = service.issue(&user_id, "a@b.com").unwrap();
    assert_ne!(token1, token2);

    assert_eq!(service.verify(&token1).unwrap(), service.verify(&token2).unwrap());
}

#[test]
fn test_verify_rejects_foreign_signature() {
    let config = create_test_config();
    let service = TokenService::from_config(&config);

    let other = TokenService::new(
        "another-secret-key-32-characters-long!!",
        "test-aes-key-for-testing-32bytes",
        300,
    );

    let token = other.issue(&fixed_user_id(), "a@b.com").unwrap();
    assert_eq!(
        service.verify(&token).unwrap_err(),
        TokenError::InvalidSignature
    );
}

#[test]
fn test_verify_rejects_expired_token() {
    let config = create_test_config();
    let service = TokenService::from_config(&config);

    let token = service
        .issue_with_lifetime(&fixed_user_id(), "a@b.com", chrono::Duration::seconds(-10))
        .unwrap();

    assert_eq!(service.verify(&token).unwrap_err(), TokenError::Expired);
}

#[test]
fn test_verify_rejects_garbage() {
    let config = create_test_config();
    let service = TokenService::from_config(&config);

    assert_eq!(
        service.verify("definitely-not-a-jwt").unwrap_err(),
        TokenError::Malformed
    );
}

#[test]
fn test_short_aes_key_round_trip() {
    // 归一化后过短的密钥仍可用于完整流程
    let service = TokenService::new("test-secret-key-for-testing-only-min-32-chars", "short", 300);
    assert_eq!(service.key_len(), 16);

    let user_id = fixed_user_id();
    let token = service.issue(&user_id, "a@b.com").unwrap();
    assert_eq!(service.verify(&token).unwrap().user_id, user_id);
}
