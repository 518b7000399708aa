use dice_formula::{
    safe_roll_with, CheckOptions, CheckRoll, EvalOptions, FormulaError, Number, Roll, RollData,
    SafeRollOptions, StepRoller, Term, TermLike,
};

fn eval(formula: &str, data: &RollData, start: u32) -> Roll {
    let mut roller = StepRoller::new(start, 1);
    let mut roll = Roll::parse(formula, data).unwrap();
    roll.evaluate_with(&mut roller, &EvalOptions::default())
        .unwrap();
    roll
}

fn total_of(formula: &str, data: &RollData) -> Number {
    eval(formula, data, 1).total().unwrap()
}

#[test]
fn conditional_vectors() {
    let data = RollData::new();
    assert_eq!(total_of("if(true, 5)", &data), Number::Int(5));
    assert_eq!(total_of("if(3 > 2)", &data), Number::Int(1));
    assert_eq!(total_of("if(1 > 3)", &data), Number::Int(0));
    assert_eq!(total_of("ifelse(3 > 6, 100, 5)", &data), Number::Int(5));
    assert_eq!(total_of("ifelse(true)", &data), Number::Int(1));

    let data = RollData::new().with("boo", 3);
    assert_eq!(total_of("ifelse(@boo == 2, 10)", &data), Number::Int(0));
}

#[test]
fn lookup_vectors() {
    let data = RollData::new();
    assert_eq!(total_of("lookup(2, 0, 10, 20, 30)", &data), Number::Int(20));
    assert_eq!(total_of("lookup(500, -100, 10, 20)", &data), Number::Int(-100));
}

fn stepped(formula: &str) -> String {
    let roll = eval(formula, &RollData::new(), 1);
    let dice = roll.dice();
    assert_eq!(dice.len(), 1, "expected one dice pool for {:?}", formula);
    dice[0].expression()
}

#[test]
fn size_roll_vectors() {
    assert_eq!(stepped("sizeRoll(1, 6, +1)"), "1d8");
    assert_eq!(stepped("sizeRoll(1, 6, +2)"), "2d6");
    assert_eq!(stepped("sizeRoll(1, 8, -1)"), "1d6");
    assert_eq!(stepped("sizeRoll(10, 6, -1)"), "6d8");
    assert_eq!(stepped("sizeRoll(2, 12, -1)"), "3d6");
    assert_eq!(stepped("sizeRoll(2, 10, +1)"), "4d8");
    assert_eq!(stepped("sizeRoll(2, 10, -1)"), "2d8");
    assert_eq!(stepped("sizeRoll(2, 4, +1)"), "2d6");
    assert_eq!(stepped("sizeRoll(4, 4, +1)"), "3d8");
    assert_eq!(stepped("sizeRoll(3, 6, -1, medium)"), "2d8");
    assert_eq!(stepped("sizeRoll(2, 6, +1, small)"), "2d8");
}

#[test]
fn checked_roll_from_bare_number() {
    let mut check = CheckRoll::new("20+2", &RollData::new(), CheckOptions::default()).unwrap();
    let mut roller = StepRoller::new(11, 1);
    let total = check
        .evaluate_with(&mut roller, &EvalOptions::default())
        .unwrap();
    assert_eq!(total, Number::Int(22));

    let dice = check.roll().dice();
    assert_eq!(dice[0].faces.get(), 20);
    assert_eq!(dice[0].active_value(), Some(Number::Int(20)));
}

#[test]
fn checked_roll_static_override_keeps_other_dice() {
    let options = CheckOptions {
        static_roll: Some(10),
        ..CheckOptions::default()
    };
    let mut check = CheckRoll::new("3d6kh1", &RollData::new(), options).unwrap();
    let mut roller = StepRoller::new(2, 1);
    let total = check
        .evaluate_with(&mut roller, &EvalOptions::default())
        .unwrap();
    assert_eq!(total, Number::Int(10));

    let dice = check.roll().dice();
    let naturals: Vec<u32> = dice[0].rolls.iter().map(|d| d.result).collect();
    assert_eq!(naturals, vec![2, 3, 4]);
}

#[test]
fn ternary_matches_plain_die_distribution() {
    for (opts, expected) in [
        (EvalOptions { minimize: true, ..EvalOptions::default() }, 1),
        (EvalOptions { maximize: true, ..EvalOptions::default() }, 6),
    ] {
        let mut roll = Roll::parse("1 == 1 ? 1d6 : 0", &RollData::new()).unwrap();
        let mut roller = StepRoller::new(1, 1);
        roll.evaluate_with(&mut roller, &opts).unwrap();
        assert_eq!(roll.total().unwrap(), Number::Int(expected));
    }
}

#[test]
fn math_call_keeps_flavor_and_form() {
    let roll = eval("max(1d6, 4)[test]", &RollData::new(), 2);
    assert_eq!(roll.formula(), "max(1d6, 4)[test]");
    assert_eq!(roll.total().unwrap(), Number::Int(4));
    assert_eq!(roll.terms()[0].flavor(), Some("test"));
}

#[test]
fn safe_roll_never_fails() {
    let data = RollData::new().with("mod", 2);
    let cases = [
        "1d6 + @mod",
        "totally broken ((",
        "lookup(1)",
        "1 / 0",
        "@nope + 1d4",
        "",
        "] [",
    ];
    for formula in cases {
        let mut roller = StepRoller::new(1, 1);
        let opts = SafeRollOptions {
            silent: true,
            ..SafeRollOptions::default()
        };
        let roll = safe_roll_with(formula, &data, &mut roller, &opts);
        assert!(roll.evaluated(), "unevaluated result for {:?}", formula);
        let _ = roll.total().unwrap().as_float();
    }
}

#[test]
fn formula_text_round_trips() {
    let data = RollData::new();
    for formula in [
        "1 + 2 * 3",
        "1d8 + 2",
        "(1d6 + 1) * 2",
        "if(3 > 2, 5) + lookup(1, 0, 10, 20)",
        "max(1d6, 4)[test]",
        "2d6[fire] + 3",
    ] {
        let first = Roll::parse(formula, &data).unwrap().formula();
        let second = Roll::parse(&first, &data).unwrap().formula();
        assert_eq!(first, second, "for {:?}", formula);
    }
}

#[test]
fn deterministic_formula_reevaluates_to_same_total() {
    let data = RollData::new();
    for formula in ["1 + 2 * 3", "if(3 > 2, 5)", "lookup(1, 0, 7, 9)", "-4 + 10"] {
        let roll = eval(formula, &data, 1);
        assert!(roll.is_deterministic());
        let again = total_of(&roll.formula(), &data);
        assert_eq!(roll.total().unwrap(), again, "for {:?}", formula);
    }
}

#[test]
fn serialization_round_trips() {
    let roll = eval("2d6kh1 + 3", &RollData::new(), 4);
    let json = serde_json::to_string(&roll).unwrap();
    assert!(json.contains(r#""type":"dice""#));

    let back: Roll = serde_json::from_str(&json).unwrap();
    assert_eq!(back.total().unwrap(), roll.total().unwrap());
    assert_eq!(back.formula(), roll.formula());

    // replayed rolls refuse to roll again
    let mut back = back;
    let mut roller = StepRoller::new(1, 1);
    assert_eq!(
        back.evaluate_with(&mut roller, &EvalOptions::default()),
        Err(FormulaError::AlreadyEvaluated)
    );
}

#[test]
fn ifelse_serialization_omits_untaken_branch() {
    let roll = eval("ifelse(1 == 1, 1d4, 99)", &RollData::new(), 2);
    let json = serde_json::to_string(&roll).unwrap();
    assert!(json.contains("if_true"));
    assert!(!json.contains("if_false"));
    assert!(!json.contains("99"));

    let back: Roll = serde_json::from_str(&json).unwrap();
    assert_eq!(back.total().unwrap(), roll.total().unwrap());
}

#[test]
fn check_serialization_freezes_options() {
    let options = CheckOptions {
        critical: 19,
        flavor: "Attack".to_owned(),
        ..CheckOptions::default()
    };
    let mut check = CheckRoll::new("1d20 + 4", &RollData::new(), options).unwrap();
    let mut roller = StepRoller::new(19, 1);
    check
        .evaluate_with(&mut roller, &EvalOptions::default())
        .unwrap();
    assert!(check.is_crit());

    let json = serde_json::to_string(&check).unwrap();
    let back: CheckRoll = serde_json::from_str(&json).unwrap();
    assert_eq!(back.options.critical, 19);
    assert_eq!(back.flavor(), "Attack");
    assert!(back.is_crit());
    assert_eq!(back.total().unwrap(), check.total().unwrap());
}

#[tokio::test]
async fn async_and_blocking_agree() {
    let data = RollData::new();
    for formula in ["1 + 2 * 3", "2d6 + if(1, 1d4)", "sizeRoll(1, 6, +1) + 2"] {
        let sync_total = {
            let mut roller = StepRoller::new(3, 1);
            let mut roll = Roll::parse(formula, &data).unwrap();
            roll.evaluate_with(&mut roller, &EvalOptions::default())
                .unwrap()
        };
        let async_total = {
            let mut roller = StepRoller::new(3, 1);
            let mut roll = Roll::parse(formula, &data).unwrap();
            roll.evaluate_async_with(&mut roller, &EvalOptions::default())
                .await
                .unwrap()
        };
        assert_eq!(sync_total, async_total, "for {:?}", formula);
    }
}

#[tokio::test]
async fn async_safe_roll_contains_errors() {
    let mut roller = StepRoller::new(1, 1);
    let opts = SafeRollOptions {
        silent: true,
        ..SafeRollOptions::default()
    };
    let roll =
        dice_formula::safe_roll_async_with("broken ((", &RollData::new(), &mut roller, &opts)
            .await;
    assert!(roll.error.is_some());
    assert_eq!(roll.total().unwrap(), Number::ZERO);
}

#[test]
fn flavor_fragments_survive_simplification() {
    let data = RollData::new().with("note", "[sneak attack]");
    let roll = eval("1d6 + 5 @note", &data, 1);
    let terms = roll.terms();
    let last = terms.last().unwrap();
    assert_eq!(last.flavor(), Some("sneak attack"));
}

#[test]
fn text_data_fragments_reclassify() {
    let data = RollData::new().with("bonus_dice", "2d6");
    let roll = eval("1 + @bonus_dice", &data, 3);
    assert_eq!(roll.total().unwrap(), Number::Int(1 + 3 + 4));
    assert!(matches!(roll.terms()[2], Term::Dice(_)));
}
