//! Unit tests for des-core primitives.

#[cfg(test)]
mod ids {
    use crate::{ComponentId, KindId};

    #[test]
    fn index_roundtrip() {
        let id = ComponentId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(ComponentId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(KindId::INVALID.0, u32::MAX);
        assert_eq!(ComponentId::default(), ComponentId::INVALID);
    }

    #[test]
    fn display() {
        assert_eq!(KindId(7).to_string(), "KindId(7)");
    }
}

#[cfg(test)]
mod kinds {
    use crate::{FlowError, KindRegistry, Measure};

    #[test]
    fn ids_are_sequential_and_unique() {
        let reg = KindRegistry::new();
        let a = reg.countable("widget").unwrap();
        let b = reg.countable("widget").unwrap();
        assert_eq!(a.id().0, 0);
        assert_eq!(b.id().0, 1);
        // Same name, different kind.
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(b.id()).unwrap(), b);
    }

    #[test]
    fn sealed_registry_refuses_new_kinds() {
        let reg = KindRegistry::new();
        reg.entity("car").unwrap();
        reg.seal();
        assert!(matches!(reg.countable("late"), Err(FlowError::Config(_))));
    }

    #[test]
    fn money_needs_minor_units() {
        let reg = KindRegistry::new();
        assert!(reg.money("usd", 0).is_err());
        let usd = reg.money("usd", 100).unwrap();
        assert_eq!(usd.measure(), Measure::Money { minor_units: 100 });
        assert!(usd.is_integral());
    }

    #[test]
    fn check_same_reports_both_ids() {
        let reg = KindRegistry::new();
        let a = reg.countable("a").unwrap();
        let b = reg.countable("b").unwrap();
        assert_eq!(
            a.check_same(&b),
            Err(FlowError::TypeMismatch { expected: a.id(), got: b.id() })
        );
    }
}

#[cfg(test)]
mod countable {
    use std::cmp::Ordering;

    use crate::{FlowError, KindRegistry, MAXIMUM_INTEGER, ResourceKind};

    fn kinds() -> (ResourceKind, ResourceKind) {
        let reg = KindRegistry::new();
        (reg.countable("gold").unwrap(), reg.uncountable("water").unwrap())
    }

    #[test]
    fn construction_validates_amount() {
        let (gold, water) = kinds();
        assert!(gold.amount(3.0).is_ok());
        assert_eq!(gold.amount(2.5).unwrap_err(), FlowError::NonIntegerAmount(2.5));
        assert!(matches!(gold.amount(-1.0), Err(FlowError::InvalidAmount(_))));
        assert!(matches!(gold.amount(f64::NAN), Err(FlowError::InvalidAmount(_))));
        assert!(water.amount(2.5).is_ok());
    }

    #[test]
    fn entity_kind_cannot_hold_amount() {
        let reg = KindRegistry::new();
        let car = reg.entity("car").unwrap();
        assert!(matches!(car.amount(1.0), Err(FlowError::Protocol(_))));
    }

    #[test]
    fn increase_and_decrease_fail_without_change() {
        let (gold, _) = kinds();
        let mut r = gold.amount(5.0).unwrap();
        assert!(!r.increase(0.5));
        assert!(!r.increase(-1.0));
        assert!(!r.decrease(6.0));
        assert!(!r.increase(MAXIMUM_INTEGER));
        assert_eq!(r.amount(), 5.0);
        assert!(r.increase(2.0));
        assert!(r.decrement());
        assert_eq!(r.amount(), 6.0);
    }

    #[test]
    fn set_amount_rejects_fraction() {
        let (gold, _) = kinds();
        let mut r = gold.amount(5.0).unwrap();
        assert!(r.set_amount(1.5).is_err());
        assert_eq!(r.amount(), 5.0);
    }

    #[test]
    fn reduce_splits_or_declines() {
        let (gold, _) = kinds();
        let mut r = gold.amount(5.0).unwrap();
        let part = r.reduce(2.0, 3.0).unwrap().unwrap();
        assert_eq!(part.amount(), 3.0);
        assert_eq!(r.amount(), 2.0);
        assert!(r.reduce(3.0, 4.0).unwrap().is_none());
        assert_eq!(r.amount(), 2.0);
        assert!(r.reduce(3.0, 1.0).is_err());
    }

    #[test]
    fn add_zeroes_source() {
        let (gold, water) = kinds();
        let mut a = gold.amount(2.0).unwrap();
        let mut b = gold.amount(3.0).unwrap();
        a.add(&mut b).unwrap();
        assert_eq!(a.amount(), 5.0);
        assert!(b.is_zero());

        let mut w = water.amount(1.0).unwrap();
        assert!(matches!(a.add(&mut w), Err(FlowError::TypeMismatch { .. })));
        assert_eq!(w.amount(), 1.0);
    }

    #[test]
    fn add_at_most_moves_partial() {
        let (gold, _) = kinds();
        let mut a = gold.amount(0.0).unwrap();
        let mut b = gold.amount(10.0).unwrap();
        assert_eq!(a.add_at_most(&mut b, 4.0).unwrap(), 4.0);
        assert_eq!((a.amount(), b.amount()), (4.0, 6.0));
    }

    #[test]
    fn compare_and_bound() {
        let (gold, _) = kinds();
        let mut a = gold.amount(7.0).unwrap();
        let b = gold.amount(3.0).unwrap();
        assert_eq!(a.compare(&b).unwrap(), Ordering::Greater);
        a.bound(0.0, 4.0).unwrap();
        assert_eq!(a.amount(), 4.0);
        a.bound(6.0, f64::INFINITY).unwrap();
        assert_eq!(a.amount(), 6.0);
    }

    #[test]
    fn bound_rejects_bad_limits_and_keeps_the_amount() {
        let (gold, water) = kinds();
        let mut a = gold.amount(5.0).unwrap();
        assert_eq!(a.bound(0.0, 2.5).unwrap_err(), FlowError::NonIntegerAmount(2.5));
        assert_eq!(a.bound_max(2.5).unwrap_err(), FlowError::NonIntegerAmount(2.5));
        assert!(matches!(a.bound(3.0, 2.0), Err(FlowError::InvalidBounds { .. })));
        assert!(matches!(a.bound(-1.0, 2.0), Err(FlowError::InvalidAmount(_))));
        assert!(matches!(a.bound_max(f64::NAN), Err(FlowError::InvalidAmount(_))));
        assert_eq!(a.amount(), 5.0);

        let mut w = water.amount(5.0).unwrap();
        w.bound_max(2.5).unwrap();
        assert_eq!(w.amount(), 2.5);
    }

    #[test]
    fn uncountable_divide_halve_scale() {
        let (gold, water) = kinds();
        let mut w = water.amount(9.0).unwrap();
        let pieces = w.divide(3).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].amount(), 3.0);
        assert_eq!(w.amount(), 3.0);

        let half = w.halve().unwrap();
        assert_eq!((half.amount(), w.amount()), (1.5, 1.5));

        w.scale(4.0).unwrap();
        assert_eq!(w.amount(), 6.0);
        assert!(w.scale(-1.0).is_err());
        assert!(w.scale(f64::NAN).is_err());

        let mut g = gold.amount(4.0).unwrap();
        assert!(matches!(g.halve(), Err(FlowError::Protocol(_))));
    }

    #[test]
    fn duplicate_is_independent() {
        let (gold, _) = kinds();
        let a = gold.amount(3.0).unwrap();
        let mut b = a.duplicate();
        b.increase(1.0);
        assert_eq!(a.amount(), 3.0);
        assert!(a.is_same_type(&b));
    }
}

#[cfg(test)]
mod money {
    use crate::{KindRegistry, Money};

    #[test]
    fn displays_major_and_minor() {
        let reg = KindRegistry::new();
        let usd = reg.money("USD", 100).unwrap();
        let m = Money::new(usd.clone(), 1234.0).unwrap();
        assert_eq!(m.to_string(), "USD 12.34");
        assert_eq!((m.major(), m.minor()), (12, 34));
        assert_eq!(usd.amount(5.0).unwrap().to_string(), "USD 0.05");
    }

    #[test]
    fn rejects_non_money_kind() {
        let reg = KindRegistry::new();
        let gold = reg.countable("gold").unwrap();
        assert!(Money::new(gold, 1.0).is_err());
    }
}

#[cfg(test)]
mod entities {
    use crate::{KindRegistry, Resource};

    #[test]
    fn equality_is_by_kind_only() {
        let reg = KindRegistry::new();
        let car = reg.entity("car").unwrap();
        let a = car.entity().unwrap().with_info(1.0);
        let b = car.entity().unwrap().with_info(2.0);
        assert_eq!(a, b);
        assert_eq!(a.amount(), 1.0);
    }

    #[test]
    fn duplicate_copies_storage_deeply() {
        let reg = KindRegistry::new();
        let kit = reg.entity("kit").unwrap();
        let bolt = reg.countable("bolt").unwrap();
        let mut a = kit.entity().unwrap();
        a.set_storage(Some(vec![Resource::from(bolt.amount(4.0).unwrap())]));
        let b = a.duplicate();
        a.take_storage();
        assert!(!a.is_composite());
        assert_eq!(b.storage().unwrap()[0].amount(), 4.0);
    }

    #[test]
    fn bulk_kind_cannot_make_entity() {
        let reg = KindRegistry::new();
        let gold = reg.countable("gold").unwrap();
        assert!(gold.entity().is_err());
    }
}

#[cfg(test)]
mod sampling {
    use crate::{ComponentId, ComponentRng, DiscreteSampler, Empirical, Fixed, FixedIndex, Sampler};

    #[test]
    fn fixed_and_external_distributions_sample() {
        let mut rng = ComponentRng::new(1, ComponentId(0));
        assert_eq!(Fixed(2.5).sample_value(&mut rng), 2.5);
        let exp = rand_distr::Exp::new(1.0).unwrap();
        let boxed: Box<dyn Sampler> = Box::new(exp);
        assert!(boxed.sample_value(&mut rng) >= 0.0);
    }

    #[test]
    fn empirical_respects_zero_weights() {
        let mut rng = ComponentRng::new(9, ComponentId(3));
        let e = Empirical::new(&[0.0, 1.0, 0.0]).unwrap();
        for _ in 0..50 {
            assert_eq!(e.sample_index(&mut rng), 1);
        }
        assert!(Empirical::new(&[]).is_err());
        assert_eq!(FixedIndex(-2).sample_index(&mut rng), -2);
    }

    #[test]
    fn component_streams_are_reproducible() {
        let mut a = ComponentRng::new(7, ComponentId(1));
        let mut b = ComponentRng::new(7, ComponentId(1));
        let mut c = ComponentRng::new(7, ComponentId(2));
        let xs: Vec<f64> = (0..5).map(|_| a.next_f64()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.next_f64()).collect();
        let zs: Vec<f64> = (0..5).map(|_| c.next_f64()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }
}

#[cfg(test)]
mod time {
    use crate::{ModelConfig, Tick};

    #[test]
    fn tick_from_time_floors() {
        assert_eq!(Tick::from_time(3.7), Some(Tick(3)));
        assert_eq!(Tick::from_time(-0.5), None);
        assert_eq!(Tick::from_time(f64::INFINITY), None);
        assert_eq!(Tick(10) + 5, Tick(15));
        assert_eq!(Tick(3).since(Tick(5)), 0);
    }

    #[test]
    fn config_validation() {
        assert!(ModelConfig::default().validate().is_ok());
        assert!(ModelConfig::default().with_end_time(0.0).validate().is_err());
        assert!(ModelConfig::default().with_start_time(f64::NAN).validate().is_err());
        assert!(ModelConfig::default().with_seed(3).with_end_time(10.0).validate().is_ok());
    }
}

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use crate::{KindRegistry, is_valid_amount};

    proptest! {
        // Whatever sequence of mutations is attempted, the amount stays a
        // non-negative integer and failed calls leave it untouched.
        #[test]
        fn integer_invariant_holds(
            start in 0u32..1_000,
            ops in prop::collection::vec((any::<bool>(), -50.0f64..50.0), 0..40),
        ) {
            let reg = KindRegistry::new();
            let gold = reg.countable("gold").unwrap();
            let mut r = gold.amount(start as f64).unwrap();
            for (up, x) in ops {
                let before = r.amount();
                let ok = if up { r.increase(x) } else { r.decrease(x) };
                if !ok {
                    prop_assert_eq!(r.amount(), before);
                }
                prop_assert!(is_valid_amount(r.amount(), true));
            }
        }

        // Clamping with arbitrary limits never leaves a fraction behind.
        #[test]
        fn bounding_keeps_countables_whole(
            start in 0u32..1_000,
            min in -10.0f64..600.0,
            max in -10.0f64..600.0,
        ) {
            let reg = KindRegistry::new();
            let gold = reg.countable("gold").unwrap();
            let mut r = gold.amount(start as f64).unwrap();
            let before = r.amount();
            if r.bound(min, max).is_err() {
                prop_assert_eq!(r.amount(), before);
            }
            prop_assert!(is_valid_amount(r.amount(), true));
            if r.bound_max(max).is_err() {
                prop_assert!(max < 0.0 || max.fract() != 0.0);
            }
            prop_assert!(is_valid_amount(r.amount(), true));
        }

        #[test]
        fn reduce_conserves_amount(start in 0u32..1_000, lo in 0u32..500, extra in 0u32..500) {
            let reg = KindRegistry::new();
            let gold = reg.countable("gold").unwrap();
            let mut r = gold.amount(start as f64).unwrap();
            let hi = (lo + extra) as f64;
            let taken = r.reduce(lo as f64, hi).unwrap().map_or(0.0, |p| p.amount());
            prop_assert_eq!(taken + r.amount(), start as f64);
        }
    }
}
