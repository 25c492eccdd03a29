use std::collections::HashMap;

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{locking_select, replaced_path, DBService, Updated};
use crate::error::{AppError, DBErrorContext, Result};

#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub profile: String,
    pub image: String,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist_id: i64,
    pub image: String,
    pub audio: String,
    pub play_count: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct SongWithArtist {
    #[serde(flatten)]
    pub song: Song,
    pub artist: Artist,
}

#[derive(Serialize, Debug, Clone)]
pub struct ArtistWithSongs {
    #[serde(flatten)]
    pub artist: Artist,
    pub songs: Vec<Song>,
}

#[derive(Debug)]
pub struct ArtistFields<'input> {
    pub name: &'input str,
    pub profile: &'input str,
}

#[derive(Debug)]
pub struct NewSong<'input> {
    pub title: &'input str,
    pub artist_id: i64,
    pub image: &'input str,
    pub audio: &'input str,
}

#[derive(Debug)]
pub struct SongUpdate<'input> {
    pub id: i64,
    pub title: &'input str,
    pub artist_id: i64,
    pub image: Option<&'input str>,
    pub audio: Option<&'input str>,
}

/// Which songs to list. Explicit ids win over the artist filter.
#[derive(Debug, PartialEq)]
pub enum SongFilter {
    All,
    Artist(i64),
    Ids(Vec<i64>),
}

// a song joined with its artist, columns of the artist are prefixed
#[derive(sqlx::FromRow)]
struct SongArtistRow {
    id: i64,
    title: String,
    artist_id: i64,
    image: String,
    audio: String,
    play_count: i64,
    artist_name: String,
    artist_profile: String,
    artist_image: String,
}

impl From<SongArtistRow> for SongWithArtist {
    fn from(row: SongArtistRow) -> Self {
        Self {
            artist: Artist {
                id: row.artist_id,
                name: row.artist_name,
                profile: row.artist_profile,
                image: row.artist_image,
            },
            song: Song {
                id: row.id,
                title: row.title,
                artist_id: row.artist_id,
                image: row.image,
                audio: row.audio,
                play_count: row.play_count,
            },
        }
    }
}

const SONG_WITH_ARTIST: &str = "SELECT song.id, song.title, song.artist_id,
    song.image, song.audio, song.play_count,
    artist.name AS artist_name, artist.profile AS artist_profile, artist.image AS artist_image
    FROM song JOIN artist ON artist.id = song.artist_id";

impl DBService {
    pub async fn create_artist(&self, fields: &ArtistFields<'_>, image: &str) -> Result<Artist> {
        let artist = sqlx::query_as::<_, Artist>(
            "INSERT INTO artist
            (name, profile, image)
            VALUES (?,?,?)
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.profile)
        .bind(image)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Cannot create artist {}", fields.name))?;

        tracing::info!("Artist {} created with id {}", artist.name, artist.id);
        Ok(artist)
    }

    pub async fn update_artist(
        &self,
        id: i64,
        fields: &ArtistFields<'_>,
        image: Option<&str>,
    ) -> Result<Updated<Artist>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| "Cannot start transaction")?;

        let previous = sqlx::query_scalar::<_, String>(&locking_select("artist", "image"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Cannot fetch artist {id}"))?
            .ok_or_else(|| AppError::not_found("Artist not found"))?;

        let artist = sqlx::query_as::<_, Artist>(
            "UPDATE artist
            SET name=?, profile=?, image=COALESCE(?, image)
            WHERE id=?
            RETURNING *",
        )
        .bind(fields.name)
        .bind(fields.profile)
        .bind(image)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Cannot update artist {id}"))?;

        tx.commit()
            .await
            .with_context(|| format!("Cannot commit update of artist {id}"))?;

        tracing::info!("Artist {} updated", artist.id);
        Ok(Updated {
            row: artist,
            replaced: replaced_path(Some(previous), image).into_iter().collect(),
        })
    }

    /// Artists with their songs. `Some(id)` restricts the list to that
    /// single artist, which may yield an empty list.
    pub async fn list_artists(&self, id: Option<i64>) -> Result<Vec<ArtistWithSongs>> {
        let artists = sqlx::query_as::<_, Artist>(
            "SELECT * FROM artist
            WHERE (? IS NULL OR id = ?)
            ORDER BY id",
        )
        .bind(id)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| "Cannot list artists")?;

        let songs = sqlx::query_as::<_, Song>(
            "SELECT * FROM song
            WHERE (? IS NULL OR artist_id = ?)
            ORDER BY id",
        )
        .bind(id)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| "Cannot list songs of artists")?;

        let mut by_artist: HashMap<i64, Vec<Song>> = HashMap::new();
        for song in songs {
            by_artist.entry(song.artist_id).or_default().push(song);
        }

        Ok(artists
            .into_iter()
            .map(|artist| ArtistWithSongs {
                songs: by_artist.remove(&artist.id).unwrap_or_default(),
                artist,
            })
            .collect())
    }

    pub async fn create_song(&self, new_song: &NewSong<'_>) -> Result<Song> {
        let song = sqlx::query_as::<_, Song>(
            "INSERT INTO song
            (title, artist_id, image, audio)
            VALUES (?,?,?,?)
            RETURNING *",
        )
        .bind(new_song.title)
        .bind(new_song.artist_id)
        .bind(new_song.image)
        .bind(new_song.audio)
        .fetch_one(&self.pool)
        .await
        .with_constraints(
            "Cannot create song",
            "Artist not found",
            "Song already exists",
        )?;

        tracing::info!(
            "Song {} created with id {} for artist {}",
            song.title,
            song.id,
            song.artist_id
        );
        Ok(song)
    }

    pub async fn update_song(&self, update: &SongUpdate<'_>) -> Result<Updated<SongWithArtist>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| "Cannot start transaction")?;

        let (previous_image, previous_audio) =
            sqlx::query_as::<_, (String, String)>(&locking_select("song", "image, audio"))
                .bind(update.id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("Cannot fetch song {}", update.id))?
                .ok_or_else(|| AppError::not_found("Song not found"))?;

        sqlx::query(
            "UPDATE song
            SET title=?, artist_id=?, image=COALESCE(?, image), audio=COALESCE(?, audio)
            WHERE id=?",
        )
        .bind(update.title)
        .bind(update.artist_id)
        .bind(update.image)
        .bind(update.audio)
        .bind(update.id)
        .execute(&mut *tx)
        .await
        .with_constraints(
            "Cannot update song",
            "Artist not found",
            "Song already exists",
        )?;

        let song: SongWithArtist =
            sqlx::query_as::<_, SongArtistRow>(&format!("{SONG_WITH_ARTIST} WHERE song.id=?"))
                .bind(update.id)
                .fetch_one(&mut *tx)
                .await
                .with_context(|| format!("Cannot fetch song {}", update.id))?
                .into();

        tx.commit()
            .await
            .with_context(|| format!("Cannot commit update of song {}", update.id))?;

        tracing::info!("Song {} updated", update.id);
        let replaced = [
            replaced_path(Some(previous_image), update.image),
            replaced_path(Some(previous_audio), update.audio),
        ];
        Ok(Updated {
            row: song,
            replaced: replaced.into_iter().flatten().collect(),
        })
    }

    pub async fn list_songs(&self, filter: &SongFilter) -> Result<Vec<SongWithArtist>> {
        let mut query = QueryBuilder::<Sqlite>::new(SONG_WITH_ARTIST);
        match filter {
            SongFilter::All => (),
            SongFilter::Artist(artist_id) => {
                query.push(" WHERE song.artist_id = ").push_bind(*artist_id);
            }
            SongFilter::Ids(ids) => {
                query.push(" WHERE song.id IN (");
                let mut separated = query.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
        }
        query.push(" ORDER BY song.id");

        let rows = query
            .build_query_as::<SongArtistRow>()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Cannot list songs with {filter:?}"))?;

        Ok(rows.into_iter().map(SongWithArtist::from).collect())
    }

    pub async fn get_song(&self, id: i64) -> Result<Option<SongWithArtist>> {
        let row = sqlx::query_as::<_, SongArtistRow>(&format!("{SONG_WITH_ARTIST} WHERE song.id=?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Cannot fetch song {id}"))?;
        Ok(row.map(SongWithArtist::from))
    }

    /// Adds one play to the song in a single statement, so concurrent plays
    /// are never lost.
    pub async fn increment_play_count(&self, id: i64) -> Result<Option<SongWithArtist>> {
        let updated = sqlx::query("UPDATE song SET play_count = play_count + 1 WHERE id=?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Cannot increment play count of song {id}"))?;

        if updated.rows_affected() == 0 {
            tracing::info!("No song with id {id} to increment");
            return Ok(None);
        }
        self.get_song(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db() -> DBService {
        let db = DBService::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn fields<'a>(name: &'a str) -> ArtistFields<'a> {
        ArtistFields {
            name,
            profile: "a profile",
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_artist_updates_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::tests::file_backed(dir.path()).await;
        let id = db
            .create_artist(&fields("Busy"), "/uploads/0.png")
            .await
            .unwrap()
            .id;

        let updates = (1..=40).map(|n| {
            let db = db.clone();
            tokio::spawn(async move {
                let image = format!("/uploads/{n}.png");
                db.update_artist(id, &fields("Busy"), Some(&image)).await
            })
        });
        let mut replaced = std::collections::BTreeSet::new();
        for result in futures::future::join_all(updates).await {
            let updated = result.unwrap().unwrap();
            assert_eq!(updated.replaced.len(), 1);
            replaced.insert(updated.replaced[0].clone());
        }

        // updates ran one after the other, each replacing a different image
        assert_eq!(replaced.len(), 40);
        let current = db.list_artists(Some(id)).await.unwrap().remove(0).artist.image;
        assert!(!replaced.contains(&current));
        db.close().await;
    }

    #[tokio::test]
    async fn songs_need_an_existing_artist() {
        let db = db().await;
        let err = db
            .create_song(&NewSong {
                title: "Orphan",
                artist_id: 42,
                image: "/uploads/i.png",
                audio: "/uploads/a.mp3",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Artist not found"));
    }

    #[tokio::test]
    async fn filter_by_ids_and_artist() {
        let db = db().await;
        let a = db.create_artist(&fields("A"), "/uploads/a.png").await.unwrap();
        let b = db.create_artist(&fields("B"), "/uploads/b.png").await.unwrap();
        let mut ids = vec![];
        for (title, artist_id) in [("one", a.id), ("two", b.id), ("three", a.id)] {
            let song = db
                .create_song(&NewSong {
                    title,
                    artist_id,
                    image: "/uploads/i.png",
                    audio: "/uploads/s.mp3",
                })
                .await
                .unwrap();
            ids.push(song.id);
        }

        let all = db.list_songs(&SongFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);

        let of_a = db.list_songs(&SongFilter::Artist(a.id)).await.unwrap();
        let titles: Vec<_> = of_a.iter().map(|s| s.song.title.as_str()).collect();
        assert_eq!(titles, ["one", "three"]);
        assert!(of_a.iter().all(|s| s.artist.name == "A"));

        let picked = db
            .list_songs(&SongFilter::Ids(vec![ids[2], ids[1]]))
            .await
            .unwrap();
        let titles: Vec<_> = picked.iter().map(|s| s.song.title.as_str()).collect();
        assert_eq!(titles, ["two", "three"]);
    }

    #[tokio::test]
    async fn artists_come_with_their_songs() {
        let db = db().await;
        let a = db.create_artist(&fields("A"), "/uploads/a.png").await.unwrap();
        db.create_artist(&fields("B"), "/uploads/b.png").await.unwrap();
        db.create_song(&NewSong {
            title: "one",
            artist_id: a.id,
            image: "/uploads/i.png",
            audio: "/uploads/s.mp3",
        })
        .await
        .unwrap();

        let all = db.list_artists(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].songs.len(), 1);
        assert!(all[1].songs.is_empty());

        let single = db.list_artists(Some(a.id)).await.unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].artist.name, "A");

        assert!(db.list_artists(Some(999)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_reports_replaced_files() {
        let db = db().await;
        let a = db.create_artist(&fields("A"), "/uploads/a.png").await.unwrap();
        let song = db
            .create_song(&NewSong {
                title: "one",
                artist_id: a.id,
                image: "/uploads/old.png",
                audio: "/uploads/old.mp3",
            })
            .await
            .unwrap();

        let updated = db
            .update_song(&SongUpdate {
                id: song.id,
                title: "renamed",
                artist_id: a.id,
                image: Some("/uploads/new.png"),
                audio: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.row.song.title, "renamed");
        assert_eq!(updated.row.song.image, "/uploads/new.png");
        assert_eq!(updated.row.song.audio, "/uploads/old.mp3");
        assert_eq!(updated.replaced, ["/uploads/old.png"]);
    }

    #[tokio::test]
    async fn play_count_goes_up_by_one() {
        let db = db().await;
        let a = db.create_artist(&fields("A"), "/uploads/a.png").await.unwrap();
        let song = db
            .create_song(&NewSong {
                title: "one",
                artist_id: a.id,
                image: "/uploads/i.png",
                audio: "/uploads/s.mp3",
            })
            .await
            .unwrap();
        assert_eq!(song.play_count, 0);

        db.increment_play_count(song.id).await.unwrap();
        let played = db.increment_play_count(song.id).await.unwrap().unwrap();
        assert_eq!(played.song.play_count, 2);

        assert!(db.increment_play_count(song.id + 1).await.unwrap().is_none());
    }
}
