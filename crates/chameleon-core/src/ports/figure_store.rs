//! 피규어 저장소 포트.
//!
//! 구현: `chameleon-storage` crate (SQLite)

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::models::figure::{FeatureSignature, Figure, FigureId, FigureSummary};

/// 파일 내용 식별자로 키잉된 피규어 저장소
///
/// 매칭 중에는 관여하지 않는다. 시작/등록/삭제 시에만 호출된다.
#[async_trait]
pub trait FigureStore: Send + Sync {
    /// 파일(크기 + MD5)에 속한 피규어 로드.
    ///
    /// 같은 피규어를 다시 로드하면 캐시된 동일 인스턴스를 돌려준다.
    async fn load_figures_for_file(&self, path: &Path) -> Result<Vec<Arc<Figure>>, CoreError>;

    /// 새 피규어 저장
    async fn save_figure(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        signature: FeatureSignature,
        source_url: &str,
    ) -> Result<Arc<Figure>, CoreError>;

    /// 전체 피규어 목록
    async fn list_figures(&self) -> Result<Vec<FigureSummary>, CoreError>;

    /// 피규어 삭제. 삭제되었으면 삭제 알림을 발행하고 `true`.
    async fn delete_figure(&self, id: FigureId) -> Result<bool, CoreError>;

    /// 삭제 알림 구독
    fn subscribe_deletions(&self) -> broadcast::Receiver<FigureId>;
}
