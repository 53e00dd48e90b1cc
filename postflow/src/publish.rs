//! Archive and schedule an approved post.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::naming::archive_file_name;
use crate::io::archive::{Archive, ArchivedFile};
use crate::io::publisher::{Publisher, ScheduleReceipt, ScheduleRequest};
use crate::pipeline::ApprovedPost;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub receipt: ScheduleReceipt,
    /// Final location in the archive, when archiving was requested.
    pub archived: Option<ArchivedFile>,
}

/// Publish `post` now (`when == None`) or at `when`.
///
/// With an archive, the image is first copied into its ready folder and moved
/// to the published folder once the publisher accepted the post. A publisher
/// failure leaves the file in the ready folder.
#[instrument(skip_all, fields(platform = %post.platform))]
pub fn publish_post<P: Publisher, A: Archive>(
    publisher: &P,
    archive: Option<&A>,
    post: &ApprovedPost,
    when: Option<DateTime<Utc>>,
    today: NaiveDate,
) -> Result<PublishOutcome> {
    let caption = post.draft.copy.caption_with_hashtags();

    let ready = archive
        .map(|archive| {
            let file_name = archive_file_name(today, post.platform, &post.topic);
            archive
                .upload_ready(&post.image.path, &file_name)
                .map(|file| (archive, file))
        })
        .transpose()
        .context("archive rendered image")?;

    let receipt = publisher.schedule(&ScheduleRequest {
        platform: post.platform,
        image_path: &post.image.path,
        caption: &caption,
        when,
    })?;
    info!(id = %receipt.id, status = %receipt.status, "post scheduled");

    let archived = ready
        .map(|(archive, file)| archive.move_to_published(&file))
        .transpose()
        .context("move archived image to published")?;

    Ok(PublishOutcome { receipt, archived })
}
