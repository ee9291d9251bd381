use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serial_test::serial;

use notesense_server::models::{files::FileMetadata, notes::NoteResponse};

mod utils;

fn text_upload(file_name: &str, contents: &str) -> Form {
    let part = Part::bytes(contents.as_bytes().to_vec()).file_name(file_name.to_string());
    Form::new().part("file", part)
}

#[tokio::test]
#[serial]
#[ignore = "requires a Postgres test database"]
async fn files_routes() -> Result<(), Box<dyn std::error::Error>> {
    let app = utils::spawn_app().await?;
    let token = utils::signup(&app, "ada@example.com").await?;
    let other_token = utils::signup(&app, "grace@example.com").await?;
    let files_url = app.url("/api/files");
    let note = utils::add_titled_note(&app, &token, "Meeting").await?;

    // Upload a text file and append it to the note.
    let form = text_upload("minutes.txt", "Ship it on Friday").text("note_id", note.id.to_string());
    let response = app
        .client
        .post(&files_url)
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let file = response.json::<FileMetadata>().await?;
    assert_eq!(file.file_name, "minutes.txt");
    assert_eq!(file.file_type, "document");
    assert_eq!(file.note_id, Some(note.id));
    assert_eq!(file.extracted_text, "Ship it on Friday");
    assert!(file.processed_at.is_some());
    assert!(file.file_path.starts_with(app.upload_dir.to_str().unwrap_or_default()));
    assert_eq!(
        tokio::fs::read_to_string(&file.file_path).await?,
        "Ship it on Friday"
    );

    let response = app
        .client
        .get(app.url(&format!("/api/notes/{}", note.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    let updated = response.json::<NoteResponse>().await?.note;
    assert_eq!(updated.content, "\n\nShip it on Friday");

    // Without an extractor configured, images are stored but not processed.
    let form = text_upload("whiteboard.PNG", "not really a png");
    let response = app
        .client
        .post(&files_url)
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let image = response.json::<FileMetadata>().await?;
    assert_eq!(image.file_type, "image");
    assert!(image.extracted_text.is_empty());
    assert!(image.processed_at.is_none());
    assert!(image.file_path.ends_with(".png"));

    // Unsupported types, missing files, and other users' notes are rejected.
    let form = text_upload("archive.zip", "PK");
    let response = app
        .client
        .post(&files_url)
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let form = Form::new().text("note_id", note.id.to_string());
    let response = app
        .client
        .post(&files_url)
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let form = text_upload("minutes.txt", "Not for you").text("note_id", note.id.to_string());
    let response = app
        .client
        .post(&files_url)
        .bearer_auth(&other_token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Files are listed newest first and only for their owner.
    let response = app.client.get(&files_url).bearer_auth(&token).send().await?;
    let response = utils::assert_ok_response(response).await?;
    let files = response.json::<Vec<FileMetadata>>().await?;
    assert_eq!(files, vec![image.clone(), file.clone()]);

    let file_url = format!("{files_url}/{}", file.id);
    let response = app.client.get(&file_url).bearer_auth(&token).send().await?;
    let response = utils::assert_ok_response(response).await?;
    assert_eq!(response.json::<FileMetadata>().await?, file);
    let response = app
        .client
        .get(&file_url)
        .bearer_auth(&other_token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app
        .client
        .get(&files_url)
        .bearer_auth(&other_token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    assert!(response.json::<Vec<FileMetadata>>().await?.is_empty());

    tokio::fs::remove_dir_all(&app.upload_dir).await?;
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
#[serial]
#[ignore = "requires a Postgres test database"]
async fn upload_to_note_deleted_during_extraction_leaves_no_file(
) -> Result<(), Box<dyn std::error::Error>> {
    let app = utils::spawn_app_with_extractors(serde_json::json!({
        "image": {"program": "sh", "args": ["-c", "sleep 2; echo whiteboard text"]}
    }))
    .await?;
    let token = utils::signup(&app, "ada@example.com").await?;
    let note = utils::add_titled_note(&app, &token, "Whiteboard").await?;

    let form = text_upload("board.png", "not really a png").text("note_id", note.id.to_string());
    let upload = app
        .client
        .post(app.url("/api/files"))
        .bearer_auth(&token)
        .multipart(form)
        .send();
    let upload = tokio::spawn(upload);

    // Delete the note while the slow extractor is still running.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    let response = app
        .client
        .delete(app.url(&format!("/api/notes/{}", note.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = upload.await??;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut user_dirs = tokio::fs::read_dir(&app.upload_dir).await?;
    while let Some(user_dir) = user_dirs.next_entry().await? {
        let mut stored = tokio::fs::read_dir(user_dir.path()).await?;
        assert!(stored.next_entry().await?.is_none());
    }

    let response = app
        .client
        .get(app.url("/api/files"))
        .bearer_auth(&token)
        .send()
        .await?;
    let response = utils::assert_ok_response(response).await?;
    assert!(response.json::<Vec<FileMetadata>>().await?.is_empty());
    Ok(())
}
