//! # chameleon-storage
//!
//! 피규어 저장소 어댑터.
//! 피규어는 등록된 문서 파일의 내용 식별자(크기 + MD5)로 키잉되어
//! SQLite에 저장되며, 경로가 바뀌어도 같은 파일이면 다시 찾을 수 있다.
//!
//! ## 모듈
//! - `sqlite`: 피규어 저장소 (FigureStore 구현)
//! - `observed_file`: 파일 내용 식별자 계산, 변경 감지
//! - `migration`: 스키마 마이그레이션

pub mod migration;
pub mod observed_file;
pub mod sqlite;

pub use observed_file::ObservedFile;
pub use sqlite::{FigureDetails, SqliteFigureStore};
