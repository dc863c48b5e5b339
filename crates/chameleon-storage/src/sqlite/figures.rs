//! 피규어 스토리지 (FigureStore 포트 구현).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chameleon_core::error::CoreError;
use chameleon_core::models::figure::{
    FeatureSignature, Figure, FigureId, FigureSummary, FileIdentity,
};
use chameleon_core::ports::figure_store::FigureStore;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{FigureDetails, SqliteFigureStore};
use crate::observed_file;

impl SqliteFigureStore {
    /// 파일 식별자에 속한 피규어 (캐시 우선)
    pub fn figures_for_identity(
        &self,
        identity: &FileIdentity,
    ) -> Result<Vec<Arc<Figure>>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, width, height, signature, url FROM figures
                 WHERE filesize = ?1 AND md5 = ?2 ORDER BY id",
            )
            .map_err(|e| CoreError::Storage(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map(params![identity.size as i64, identity.md5], |row| {
                Ok((
                    FigureId(row.get(0)?),
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| CoreError::Storage(format!("피규어 조회 실패: {e}")))?;

        let mut figures = Vec::new();
        let mut cache = self.cache.lock();
        for row in rows {
            let (id, width, height, signature, source_url) =
                row.map_err(|e| CoreError::Storage(format!("피규어 행 읽기 실패: {e}")))?;
            if let Some(cached) = cache.get(&id) {
                figures.push(Arc::clone(cached));
                continue;
            }
            let signature: FeatureSignature = serde_json::from_str(&signature)?;
            let figure = Arc::new(Figure {
                id,
                width,
                height,
                signature,
                source_url,
            });
            cache.insert(id, Arc::clone(&figure));
            figures.push(figure);
        }
        Ok(figures)
    }

    fn insert_figure(
        &self,
        identity: &FileIdentity,
        width: u32,
        height: u32,
        signature: FeatureSignature,
        source_url: &str,
    ) -> Result<Arc<Figure>, CoreError> {
        let encoded = serde_json::to_string(&signature)?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;

        conn.execute(
            "INSERT INTO figures (filesize, md5, width, height, signature, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                identity.size as i64,
                identity.md5,
                width,
                height,
                encoded,
                source_url,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| CoreError::Storage(format!("피규어 저장 실패: {e}")))?;

        let figure = Arc::new(Figure {
            id: FigureId(conn.last_insert_rowid()),
            width,
            height,
            signature,
            source_url: source_url.to_string(),
        });
        self.cache.lock().insert(figure.id, Arc::clone(&figure));
        debug!("피규어 저장: id={}, md5={}", figure.id, identity.md5);
        Ok(figure)
    }

    fn remove_figure(&self, id: FigureId) -> Result<bool, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;
        let changed = conn
            .execute("DELETE FROM figures WHERE id = ?1", params![id.0])
            .map_err(|e| CoreError::Storage(format!("피규어 삭제 실패: {e}")))?;
        self.cache.lock().remove(&id);
        Ok(changed > 0)
    }

    /// 피규어 상세 조회
    pub fn figure_details(&self, id: FigureId) -> Result<Option<FigureDetails>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;

        let row = conn
            .query_row(
                "SELECT width, height, signature, url, filesize, md5, created_at
                 FROM figures WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CoreError::Storage(format!("피규어 조회 실패: {e}")))?;

        let Some((width, height, signature, source_url, file_size, md5, created_at)) = row else {
            return Ok(None);
        };
        let signature: FeatureSignature = serde_json::from_str(&signature)?;
        Ok(Some(FigureDetails {
            id,
            width,
            height,
            keypoint_count: signature.len(),
            source_url,
            file_size: file_size.max(0) as u64,
            md5,
            created_at,
        }))
    }

    /// 파일 내용이 바뀌었을 때 피규어를 새 식별자로 옮긴다. 옮긴 수를 돌려준다.
    pub fn update_file_identity(
        &self,
        old_md5: &str,
        new_identity: &FileIdentity,
    ) -> Result<usize, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;
        let changed = conn
            .execute(
                "UPDATE figures SET filesize = ?1, md5 = ?2 WHERE md5 = ?3",
                params![new_identity.size as i64, new_identity.md5, old_md5],
            )
            .map_err(|e| CoreError::Storage(format!("파일 식별자 갱신 실패: {e}")))?;
        info!("파일 식별자 갱신: {old_md5} → {}, {changed}건", new_identity.md5);
        Ok(changed)
    }

    /// 피규어 URL 일괄 변경. 캐시된 피규어는 불변이므로 캐시에서 빼서 다음 로드 때 새로 읽는다.
    pub fn update_figure_url(&self, old_url: &str, new_url: &str) -> Result<usize, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;
        let changed = conn
            .execute(
                "UPDATE figures SET url = ?1 WHERE url = ?2",
                params![new_url, old_url],
            )
            .map_err(|e| CoreError::Storage(format!("URL 갱신 실패: {e}")))?;
        if changed > 0 {
            self.cache.lock().retain(|_, f| f.source_url != old_url);
        }
        Ok(changed)
    }

    fn summaries(&self) -> Result<Vec<FigureSummary>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;
        let mut stmt = conn
            .prepare("SELECT id, url FROM figures ORDER BY id")
            .map_err(|e| CoreError::Storage(format!("쿼리 준비 실패: {e}")))?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(FigureSummary {
                    id: FigureId(row.get(0)?),
                    source_url: row.get(1)?,
                })
            })
            .map_err(|e| CoreError::Storage(format!("피규어 목록 조회 실패: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Storage(format!("피규어 행 읽기 실패: {e}")))?;
        Ok(summaries)
    }
}

/// 파일 해시는 블로킹 스레드에서 계산
async fn identity_of(path: &Path) -> Result<FileIdentity, CoreError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || observed_file::compute_identity(&path))
        .await
        .map_err(|e| CoreError::Internal(format!("파일 식별 작업 실패: {e}")))?
}

#[async_trait]
impl FigureStore for SqliteFigureStore {
    async fn load_figures_for_file(&self, path: &Path) -> Result<Vec<Arc<Figure>>, CoreError> {
        let identity = identity_of(path).await?;
        self.figures_for_identity(&identity)
    }

    async fn save_figure(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        signature: FeatureSignature,
        source_url: &str,
    ) -> Result<Arc<Figure>, CoreError> {
        let identity = identity_of(path).await?;
        self.insert_figure(&identity, width, height, signature, source_url)
    }

    async fn list_figures(&self) -> Result<Vec<FigureSummary>, CoreError> {
        self.summaries()
    }

    async fn delete_figure(&self, id: FigureId) -> Result<bool, CoreError> {
        let deleted = self.remove_figure(id)?;
        if deleted {
            // 구독자가 없어도 삭제는 유효하다
            let _ = self.deletions.send(id);
            info!(figure_id = %id, "피규어 삭제");
        }
        Ok(deleted)
    }

    fn subscribe_deletions(&self) -> broadcast::Receiver<FigureId> {
        self.deletions.subscribe()
    }
}
