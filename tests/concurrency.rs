//! Concurrent placement, execution and cancellation against one book.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

use trading_engine::core::{Error, OrderIntent, OrderStatus, Side, Symbol};
use trading_engine::execution::OrderBook;
use trading_engine::risk::RiskEngine;

fn book_with_limit(symbol: &str, limit: Decimal) -> OrderBook {
    let risk = Arc::new(RiskEngine::new());
    risk.set_exposure_limit(symbol, limit);
    OrderBook::new(risk)
}

#[test]
fn test_concurrent_placements_cannot_jointly_exceed_limit() {
    for _ in 0..50 {
        let book = book_with_limit("AAPL", dec!(10000));
        let barrier = Barrier::new(8);

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        book.place_order(&OrderIntent::market("AAPL", Side::Buy, dec!(6000), dec!(150)))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        assert!(results.iter().filter_map(|r| r.as_ref().err()).all(Error::is_risk_rejection));
        assert_eq!(book.risk().position(&Symbol::new("AAPL")), dec!(6000));
        assert_eq!(book.len(), 1);
    }
}

#[test]
fn test_position_never_exceeds_limit_under_load() {
    let book = book_with_limit("AAPL", dec!(1000));

    thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|| {
                for _ in 0..100 {
                    let _ = book.place_order(&OrderIntent::market("AAPL", Side::Buy, dec!(7), dec!(1)));
                }
            });
        }
    });

    let position = book.risk().position(&Symbol::new("AAPL"));
    assert!(position <= dec!(1000));
    assert_eq!(position, Decimal::from(book.len() as u64) * dec!(7));
    // 142 * 7 = 994, one more would cross the limit
    assert_eq!(book.len(), 142);
}

#[test]
fn test_execute_and_cancel_race_has_one_winner() {
    for _ in 0..100 {
        let book = book_with_limit("AAPL", dec!(100));
        let id = book
            .place_order(&OrderIntent::market("AAPL", Side::Buy, dec!(10), dec!(150)))
            .unwrap();
        let barrier = Barrier::new(2);

        let (executed, cancelled) = thread::scope(|s| {
            let exec = s.spawn(|| {
                barrier.wait();
                book.execute_order(&id)
            });
            let cancel = s.spawn(|| {
                barrier.wait();
                book.cancel_order(&id)
            });
            (exec.join().unwrap(), cancel.join().unwrap())
        });

        assert!(executed.is_ok() ^ cancelled.is_ok());
        let status = book.get_order(&id).unwrap().status();
        let aapl = Symbol::new("AAPL");
        if executed.is_ok() {
            assert_eq!(status, OrderStatus::Executed);
            assert!(matches!(cancelled, Err(Error::InvalidTransition { .. })));
            assert_eq!(book.risk().filled_position(&aapl), dec!(10));
        } else {
            assert_eq!(status, OrderStatus::Cancelled);
            assert!(matches!(executed, Err(Error::InvalidTransition { .. })));
            assert_eq!(book.risk().filled_position(&aapl), Decimal::ZERO);
            assert_eq!(book.risk().position(&aapl), Decimal::ZERO);
        }
    }
}

#[test]
fn test_independent_orders_progress_in_parallel() {
    let book = book_with_limit("MSFT", dec!(1000));
    let ids: Vec<_> = (0..100)
        .map(|_| {
            book.place_order(&OrderIntent::market("MSFT", Side::Buy, dec!(5), dec!(300)))
                .unwrap()
        })
        .collect();

    thread::scope(|s| {
        for chunk in ids.chunks(25) {
            let book = &book;
            s.spawn(move || {
                for (i, id) in chunk.iter().enumerate() {
                    if i % 2 == 0 {
                        book.execute_order(id).unwrap();
                    } else {
                        book.cancel_order(id).unwrap();
                    }
                }
            });
        }
    });

    let msft = Symbol::new("MSFT");
    assert!(book.open_orders().is_empty());
    assert_eq!(book.risk().filled_position(&msft), dec!(260));
    assert_eq!(book.risk().position(&msft), dec!(260));
}

#[test]
fn test_limit_updates_race_with_checks() {
    let risk = Arc::new(RiskEngine::new());
    let aapl = Symbol::new("AAPL");

    thread::scope(|s| {
        s.spawn(|| {
            for i in 1..=500 {
                risk.set_exposure_limit("AAPL", Decimal::from(i));
            }
        });
        s.spawn(|| {
            for _ in 0..500 {
                // a check sees either no limit or some complete value
                let _ = risk.check_risk(&aapl, dec!(250));
            }
        });
    });

    assert_eq!(risk.exposure_limit(&aapl), Some(dec!(500)));
    assert!(risk.check_risk(&aapl, dec!(500)));
    assert!(!risk.check_risk(&aapl, dec!(501)));
}

proptest! {
    #[test]
    fn prop_check_risk_is_le_limit(limit in -1_000_000i64..1_000_000, proposed in -1_000_000i64..1_000_000) {
        let risk = RiskEngine::new();
        let symbol = Symbol::new("AAPL");
        let (limit, proposed) = (Decimal::from(limit), Decimal::from(proposed));

        prop_assert!(!risk.check_risk(&symbol, proposed));
        risk.set_exposure_limit(symbol.clone(), limit);
        prop_assert_eq!(risk.check_risk(&symbol, proposed), proposed <= limit);
    }

    #[test]
    fn prop_placement_keeps_position_within_limit(quantities in proptest::collection::vec(1i64..500, 1..40)) {
        let book = book_with_limit("AAPL", dec!(2000));
        let symbol = Symbol::new("AAPL");

        for q in quantities {
            let before = book.risk().position(&symbol);
            let q = Decimal::from(q);
            match book.place_order(&OrderIntent::market("AAPL", Side::Buy, q, dec!(1))) {
                Ok(_) => {
                    prop_assert_eq!(book.risk().position(&symbol), before + q);
                }
                Err(e) => {
                    prop_assert!(e.is_risk_rejection());
                    prop_assert!(before + q > dec!(2000));
                    prop_assert_eq!(book.risk().position(&symbol), before);
                }
            }
            prop_assert!(book.risk().position(&symbol) <= dec!(2000));
        }
    }
}
