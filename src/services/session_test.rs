use super::*;

#[test]
fn bytes_to_hex_formats_lowercase_pairs() {
    assert_eq!(bytes_to_hex(&[0x00, 0xff, 0x0a]), "00ff0a");
}

#[test]
fn generated_tokens_are_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generated_tokens_are_unique() {
    assert_ne!(generate_token(), generate_token());
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::state::test_helpers::live_pool;

    #[tokio::test]
    async fn session_round_trip() {
        let pool = live_pool().await;
        let row = sqlx::query("INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id")
            .bind(format!("{}@example.com", Uuid::new_v4()))
            .bind("tester")
            .fetch_one(&pool)
            .await
            .unwrap();
        let user_id: Uuid = row.get("id");

        let token = create_session(&pool, user_id).await.unwrap();
        let user = validate_session(&pool, &token).await.unwrap().unwrap();
        assert_eq!(user.id, user_id);

        delete_session(&pool, &token).await.unwrap();
        assert!(validate_session(&pool, &token).await.unwrap().is_none());
    }
}
