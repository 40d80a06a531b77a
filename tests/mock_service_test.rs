#[cfg(feature = "mock")]
mod mock_tests {
    use bluos_scrobbler::{
        MockScrobbleService, MockStatusSource, PlayerStatus, Result, ScrobblePayload,
        ScrobbleService, StatusSource, TransportState,
    };

    #[tokio::test]
    async fn test_mock_status_source() -> Result<()> {
        let mut mock_source = MockStatusSource::new();

        mock_source.expect_fetch().times(1).returning(|| {
            Ok(PlayerStatus {
                artist: Some("Radiohead".to_string()),
                title: Some("Karma Police".to_string()),
                album: Some("OK Computer".to_string()),
                duration: Some(261),
                elapsed: Some(42),
                state: TransportState::Playing,
            })
        });

        // Use the mock as a trait object
        let source: &dyn StatusSource = &mock_source;
        let status = source.fetch().await?;

        assert_eq!(status.artist.as_deref(), Some("Radiohead"));
        assert_eq!(status.state, TransportState::Playing);

        Ok(())
    }

    #[tokio::test]
    async fn test_mock_scrobble_service() -> Result<()> {
        let mut mock_service = MockScrobbleService::new();

        mock_service
            .expect_update_now_playing()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        mock_service
            .expect_scrobble()
            .withf(|payload: &ScrobblePayload| payload.title == "Karma Police")
            .times(1)
            .returning(|_| Ok(()));

        let service: &dyn ScrobbleService = &mock_service;

        service
            .update_now_playing("Radiohead", "Karma Police", Some("OK Computer"), Some(261))
            .await?;

        let payload = ScrobblePayload {
            artist: "Radiohead".to_string(),
            title: "Karma Police".to_string(),
            album: Some("OK Computer".to_string()),
            duration: Some(261),
            timestamp: 1_640_995_200,
        };
        service.scrobble(&payload).await?;

        Ok(())
    }
}
