use reqwest::StatusCode;
use serial_test::serial;

use notesense_server::models::notes::{
    Connection, MAX_CONNECTIONS, NewConnectionRequest, NoteConnections, NoteResponse,
};

mod utils;

#[tokio::test]
#[serial]
#[ignore = "requires a Postgres test database"]
async fn connections_routes() -> Result<(), Box<dyn std::error::Error>> {
    let app = utils::spawn_app().await?;
    let token = utils::signup(&app, "ada@example.com").await?;
    let other_token = utils::signup(&app, "grace@example.com").await?;

    let source = utils::add_titled_note(&app, &token, "Project").await?;
    let mut targets = vec![];
    for i in 0..=MAX_CONNECTIONS {
        targets.push(utils::add_titled_note(&app, &token, &format!("Task {i}")).await?);
    }
    let foreign = utils::add_titled_note(&app, &other_token, "Not yours").await?;
    let connections_url = app.url(&format!("/api/notes/{}/connections", source.id));

    // Starts with no connections.
    let response = app
        .client
        .get(&connections_url)
        .bearer_auth(&token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    let connections = response.json::<NoteConnections>().await?;
    assert_eq!(connections.note_id, source.id);
    assert!(connections.connections.is_empty());

    // Fill up to the cap.
    for target in &targets[..MAX_CONNECTIONS] {
        let body = NewConnectionRequest::builder()
            .connected_note_id(target.id)
            .build();
        let response = app
            .client
            .post(&connections_url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let body = NewConnectionRequest::builder()
        .connected_note_id(targets[MAX_CONNECTIONS].id)
        .build();
    let response = app
        .client
        .post(&connections_url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Duplicates and self-links are rejected.
    let body = NewConnectionRequest::builder()
        .connected_note_id(targets[0].id)
        .connection_type("blocks".to_string())
        .build();
    let response = app
        .client
        .post(&connections_url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = NewConnectionRequest::builder()
        .connected_note_id(source.id)
        .build();
    let response = app
        .client
        .post(&connections_url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Remove a connection to make room, then connect with a custom type.
    let response = app
        .client
        .delete(format!("{connections_url}/{}", targets[0].id))
        .bearer_auth(&token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    let connections = response.json::<NoteConnections>().await?;
    assert_eq!(connections.connections.len(), MAX_CONNECTIONS - 1);
    assert!(connections.connections.iter().all(|c| c.note_id != targets[0].id));
    let response = app
        .client
        .delete(format!("{connections_url}/{}", targets[0].id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = NewConnectionRequest::builder()
        .connected_note_id(targets[MAX_CONNECTIONS].id)
        .connection_type("blocks".to_string())
        .build();
    let response = app
        .client
        .post(&connections_url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let connections = response.json::<NoteConnections>().await?;
    assert_eq!(
        connections.connections.last(),
        Some(&Connection {
            note_id: targets[MAX_CONNECTIONS].id,
            connection_type: "blocks".to_string(),
        })
    );

    // Other users' notes can't be connected to, and other users can't see
    // the connections.
    let response = app
        .client
        .delete(format!("{connections_url}/{}", targets[1].id))
        .bearer_auth(&token)
        .send()
        .await?;
    utils::assert_ok_response(response).await?;
    let body = NewConnectionRequest::builder()
        .connected_note_id(foreign.id)
        .build();
    let response = app
        .client
        .post(&connections_url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app
        .client
        .get(&connections_url)
        .bearer_auth(&other_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting a connected note drops it from the source's connections.
    let response = app
        .client
        .delete(app.url(&format!("/api/notes/{}", targets[2].id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .client
        .get(app.url(&format!("/api/notes/{}", source.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    let source = response.json::<NoteResponse>().await?.note;
    assert!(!source.connected_note_ids.contains(&targets[2].id));
    assert_eq!(
        source.connected_note_ids.len(),
        source.connection_types.len()
    );
    assert_eq!(source.connected_note_ids.len(), MAX_CONNECTIONS - 2);
    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires a Postgres test database"]
async fn connecting_to_deleted_note_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let app = utils::spawn_app().await?;
    let token = utils::signup(&app, "ada@example.com").await?;
    let source = utils::add_titled_note(&app, &token, "Project").await?;
    let target = utils::add_titled_note(&app, &token, "Gone").await?;

    let response = app
        .client
        .delete(app.url(&format!("/api/notes/{}", target.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = NewConnectionRequest::builder()
        .connected_note_id(target.id)
        .build();
    let response = app
        .client
        .post(app.url(&format!("/api/notes/{}/connections", source.id)))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .client
        .get(app.url(&format!("/api/notes/{}/connections", source.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    assert!(response.json::<NoteConnections>().await?.connections.is_empty());
    Ok(())
}
