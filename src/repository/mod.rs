// ==========================================
// 市场主体关系引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 定义存储 trait 并提供 SQLite 实现,屏蔽数据库细节
// 约束: 所有查询使用参数化;聚合写入走 IMMEDIATE 事务 + revision 乐观锁
// ==========================================

pub mod actor_repo;
pub mod balance_responsibility_repo;
pub mod delegation_repo;
pub mod domain_event_repo;
pub mod error;
pub mod row_utils;
pub mod unit_of_work;
pub mod unrecognized_actor_repo;

// 重导出核心仓储
pub use actor_repo::{ActorDirectory, ActorRepository};
pub use balance_responsibility_repo::{BalanceResponsibilityRepository, BalanceResponsibilityStore};
pub use delegation_repo::{ProcessDelegationRepository, ProcessDelegationStore};
pub use domain_event_repo::DomainEventRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use unit_of_work::RelationUnitOfWork;
pub use unrecognized_actor_repo::{UnrecognizedActorRepository, UnrecognizedActorStore};
