//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 설정을 저장/로드하고,
//! 변경 사항을 `watch` 채널로 구독자(스케줄러 등)에게 전파한다.

use crate::config::AppConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 설정 관리자
///
/// 설정 파일의 로드/저장 및 런타임 설정 변경을 관리한다.
/// 복제본은 같은 채널을 공유하므로 어느 쪽에서 갱신해도 모든 구독자가 받는다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 현재 설정 + 변경 알림
    tx: Arc<watch::Sender<AppConfig>>,
    /// 설정 파일 경로 (None이면 메모리 전용)
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 플랫폼 기본 경로로 설정 관리자 생성
    ///
    /// 설정 파일이 없으면 기본 설정을 생성하고 저장한다.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_path(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// 지정된 경로로 설정 관리자 생성
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {e}",
                        parent.display()
                    ))
                })?;
                info!("설정 디렉토리 생성: {}", parent.display());
            }
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default_config();
            Self::save_to_file(&config_path, &default_config)?;
            info!("기본 설정 파일 생성: {}", config_path.display());
            default_config
        };
        config.validate()?;

        let (tx, _rx) = watch::channel(config);
        Ok(Self {
            tx: Arc::new(tx),
            config_path: Some(config_path),
        })
    }

    /// 파일 없이 메모리에서만 동작하는 관리자 (테스트/임베딩용)
    pub fn in_memory(config: AppConfig) -> Self {
        let (tx, _rx) = watch::channel(config);
        Self {
            tx: Arc::new(tx),
            config_path: None,
        }
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> AppConfig {
        self.tx.borrow().clone()
    }

    /// 변경 알림 구독
    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    /// 설정 업데이트, 파일 저장 후 구독자에게 전파
    pub fn update(&self, new_config: AppConfig) -> Result<(), CoreError> {
        new_config.validate()?;

        if let Some(path) = &self.config_path {
            Self::save_to_file(path, &new_config)?;
            debug!("설정 저장 완료: {}", path.display());
        }

        self.tx.send_replace(new_config);
        Ok(())
    }

    /// 특정 필드만 업데이트
    pub fn update_with<F>(&self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.get();
        updater(&mut config);
        self.update(config.clone())?;
        Ok(config)
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 설정 다시 로드
    pub fn reload(&self) -> Result<(), CoreError> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        let config = Self::load_from_file(path)?;
        config.validate()?;
        self.tx.send_replace(config);
        info!("설정 다시 로드 완료");
        Ok(())
    }

    /// 플랫폼별 설정 디렉토리 경로
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// 데이터 디렉토리 경로 (피규어 DB)
    pub fn data_dir() -> Result<PathBuf, CoreError> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs, CoreError> {
        ProjectDirs::from("org", "chameleon", "chameleon").ok_or_else(|| {
            CoreError::Config("홈 디렉토리를 확인할 수 없습니다".to_string())
        })
    }

    /// 파일에서 설정 로드
    fn load_from_file(path: &Path) -> Result<AppConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {e}", path.display()))
        })?;

        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {e}", path.display()))
        })?;

        debug!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    /// 파일에 설정 저장
    fn save_to_file(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::Config(format!("설정 직렬화 실패: {e}")))?;

        fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("설정 파일 저장 실패: {}: {e}", path.display()))
        })?;

        Ok(())
    }
}
