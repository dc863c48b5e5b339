//! SQLite 피규어 저장소.
//!
//! `FigureStore` 포트 구현.
//!
//! # 모듈 구조
//! - `figures`: 피규어 저장/조회/삭제, 파일 식별자와 URL 갱신

mod figures;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chameleon_core::error::CoreError;
use chameleon_core::models::figure::{Figure, FigureId};
use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::info;

use crate::migration;

/// 삭제 알림 채널 용량
const DELETION_CHANNEL_CAPACITY: usize = 64;

/// SQLite 피규어 저장소
///
/// 한 번 로드한 피규어는 캐시에 남아, 같은 피규어를 다시 로드하면
/// 동일한 `Arc<Figure>` 인스턴스를 돌려준다.
pub struct SqliteFigureStore {
    pub(super) conn: Mutex<Connection>,
    pub(super) cache: parking_lot::Mutex<HashMap<FigureId, Arc<Figure>>>,
    pub(super) deletions: broadcast::Sender<FigureId>,
}

impl SqliteFigureStore {
    /// 파일 기반 저장소 생성
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Storage(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        info!("피규어 저장소 초기화: {}", path.display());
        Ok(Self::with_connection(conn))
    }

    /// 인메모리 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        let (deletions, _) = broadcast::channel(DELETION_CHANNEL_CAPACITY);
        Self {
            conn: Mutex::new(conn),
            cache: parking_lot::Mutex::new(HashMap::new()),
            deletions,
        }
    }
}

/// 피규어 상세 (DB 조회 결과)
#[derive(Debug, Clone, PartialEq)]
pub struct FigureDetails {
    pub id: FigureId,
    pub width: u32,
    pub height: u32,
    pub keypoint_count: usize,
    pub source_url: String,
    /// 소속 파일 크기 (바이트)
    pub file_size: u64,
    /// 소속 파일 MD5
    pub md5: String,
    /// 등록 시각 (RFC3339)
    pub created_at: String,
}
