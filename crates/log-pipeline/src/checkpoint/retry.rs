//! 제한 횟수 재시도와 지수 대기
//!
//! 실패할 때마다 `1, f, f^2, ...` 시간 단위만큼 대기하며, 최대 시도 횟수를 넘기면
//! 포기합니다. 대기는 [`Sleeper`]로 추상화되어 테스트에서 시간을 흘려보내지 않습니다.

use std::fmt::Display;
use std::time::Duration;

use tracing::{error, warn};

/// 차단 대기 추상화
pub trait Sleeper: Send + Sync {
    /// 주어진 시간만큼 현재 스레드를 멈춥니다.
    fn sleep(&self, duration: Duration);
}

/// `std::thread::sleep` 기반 구현
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 대기 배수
    pub factor: u32,
    /// 첫 대기 시간 (시간 단위)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            factor: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// 재시도 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// 성공 (시도 횟수 포함)
    Succeeded {
        /// 성공까지 걸린 시도 횟수
        attempts: u32,
    },
    /// 모든 시도 실패
    GaveUp {
        /// 시도 횟수
        attempts: u32,
        /// 마지막 에러 메시지
        last_error: String,
    },
}

impl RetryOutcome {
    /// 성공 여부
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

impl RetryPolicy {
    /// 정책을 생성합니다. 첫 대기는 1초입니다.
    pub fn new(max_attempts: u32, factor: u32) -> Self {
        Self {
            max_attempts,
            factor,
            ..Self::default()
        }
    }

    /// 실패 후 대기 시간 목록 (시도 순서대로)
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let factor = self.factor.max(1);
        (0..self.max_attempts).scan(self.base_delay, move |delay, _| {
            let current = *delay;
            *delay = delay.saturating_mul(factor);
            Some(current)
        })
    }

    /// 작업을 정책에 따라 실행합니다.
    ///
    /// 실패할 때마다 경고를 남기고 대기하며, 포기하면 에러 로그를 남깁니다.
    /// 작업의 에러는 호출자에게 전파하지 않습니다.
    pub fn run<E, F>(&self, what: &str, sleeper: &dyn Sleeper, mut op: F) -> RetryOutcome
    where
        E: Display,
        F: FnMut(u32) -> Result<(), E>,
    {
        let mut last_error = String::new();
        let mut attempts = 0;

        for delay in self.delays() {
            attempts += 1;
            match op(attempts) {
                Ok(()) => return RetryOutcome::Succeeded { attempts },
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "{what} failed, retrying"
                    );
                    sleeper.sleep(delay);
                }
            }
        }

        error!(attempts, error = %last_error, "{what} failed after all retries");
        RetryOutcome::GaveUp {
            attempts,
            last_error,
        }
    }
}
